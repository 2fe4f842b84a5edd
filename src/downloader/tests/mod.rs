//! Orchestrator behavior tests, driven through the public handle.

use super::Subscriber;
use super::test_helpers::*;
use crate::error::Error;
use crate::policy::{DownloadingPolicy, TogglePolicy};
use crate::types::{DownloaderState, Event, FileId, QueuedFile};
use std::sync::Arc;


const M1: &str = "http://m1.example.com/";
const M2: &str = "http://m2.example.com/";

fn map_file(id: &str) -> QueuedFile {
    QueuedFile::new(id, format!("{id}.mwm"), 240105)
}
