//! In-memory gateways for tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::sheets::SpreadsheetGateway;
use crate::store::{Param, ResultSet, StoreGateway};

/// Spreadsheet gateway over fixed ranges that records every read and append
#[derive(Default)]
pub struct MemorySheets {
    ranges: HashMap<(String, String), Vec<Vec<String>>>,
    failing_reads: HashSet<String>,
    panicking_reads: HashSet<String>,
    failing_appends: HashSet<usize>,
    reads: Mutex<Vec<(String, String)>>,
    appended: Mutex<Vec<(String, String, Vec<String>)>>,
    append_calls: Mutex<usize>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, document_id: &str, range: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.ranges
            .insert((document_id.to_string(), range.to_string()), rows);
        self
    }

    /// Reads of `document_id` return an error
    pub fn failing_read(mut self, document_id: &str) -> Self {
        self.failing_reads.insert(document_id.to_string());
        self
    }

    /// Reads of `document_id` panic
    pub fn panicking_read(mut self, document_id: &str) -> Self {
        self.panicking_reads.insert(document_id.to_string());
        self
    }

    /// The `n`th append call (1-based) fails
    pub fn failing_append_at(mut self, n: usize) -> Self {
        self.failing_appends.insert(n);
        self
    }

    pub fn reads(&self) -> Vec<(String, String)> {
        self.reads.lock().unwrap().clone()
    }

    pub fn appended(&self) -> Vec<(String, String, Vec<String>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpreadsheetGateway for MemorySheets {
    async fn read(&self, document_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        self.reads
            .lock()
            .unwrap()
            .push((document_id.to_string(), range.to_string()));

        if self.panicking_reads.contains(document_id) {
            panic!("simulated panic reading {}", document_id);
        }
        if self.failing_reads.contains(document_id) {
            return Err(anyhow!("simulated read failure for {}", document_id));
        }

        Ok(self
            .ranges
            .get(&(document_id.to_string(), range.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, document_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let call = {
            let mut calls = self.append_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.failing_appends.contains(&call) {
            return Err(anyhow!("simulated append failure"));
        }

        let mut appended = self.appended.lock().unwrap();
        for row in rows {
            appended.push((document_id.to_string(), range.to_string(), row.clone()));
        }
        Ok(())
    }
}

/// Everything a [`RecordingStore`] saw, shared so tests can inspect it after
/// the store has been handed off
#[derive(Debug, Default, Clone)]
pub struct StoreLog {
    pub calls: Vec<(String, Vec<Param>)>,
    pub committed: Vec<Vec<Param>>,
    pub rolled_back: Vec<Vec<Param>>,
    pub closes: usize,
}

/// Store gateway that treats each call's arguments as its transaction
pub struct RecordingStore {
    log: Arc<Mutex<StoreLog>>,
    pending: Vec<Vec<Param>>,
    failing_calls: HashSet<usize>,
}

impl RecordingStore {
    pub fn new() -> (Self, Arc<Mutex<StoreLog>>) {
        let log = Arc::new(Mutex::new(StoreLog::default()));
        let store = RecordingStore {
            log: log.clone(),
            pending: Vec::new(),
            failing_calls: HashSet::new(),
        };
        (store, log)
    }

    /// The `n`th procedure call (1-based) fails after opening its transaction
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.failing_calls.insert(n);
        self
    }
}

#[async_trait]
impl StoreGateway for RecordingStore {
    async fn call_procedure(&mut self, name: &str, params: &[Param]) -> Result<Vec<ResultSet>> {
        let call = {
            let mut log = self.log.lock().unwrap();
            log.calls.push((name.to_string(), params.to_vec()));
            log.calls.len()
        };
        self.pending.push(params.to_vec());

        if self.failing_calls.contains(&call) {
            return Err(anyhow!("simulated store failure on call {}", call));
        }
        Ok(Vec::new())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.committed.append(&mut self.pending);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.rolled_back.append(&mut self.pending);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}
