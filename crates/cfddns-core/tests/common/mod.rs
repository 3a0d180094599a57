//! Test doubles and common utilities for contract tests
//!
//! The doubles count every call so tests can assert which provider
//! operations a cycle did (and did not) perform.

#![allow(dead_code)]

use cfddns_core::Settings;
use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{
    DnsProvider, IpSource, PublishedRecord, RecordId, RecordType, RecordUpdate, ZoneId,
};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ZONE: &str = "example.com";
pub const RECORD: &str = "home.example.com";
pub const ZONE_ID: &str = "023e105f4ecef8ad9ca31a8372d0c353";
pub const RECORD_ID: &str = "372e67954025e0ba6aaa6d586b9e0b59";

/// Settings for `home.example.com` in `example.com`
pub fn settings() -> Settings {
    Settings::new(ZONE, RECORD, "admin@example.com", "test-key")
}

/// An IpSource that replays scripted answers
///
/// Answers are consumed in order; the last one repeats forever.
#[derive(Clone)]
pub struct ScriptedIpSource {
    answers: Arc<Mutex<VecDeque<Result<Ipv4Addr>>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(answers: Vec<Result<Ipv4Addr>>) -> Self {
        assert!(!answers.is_empty(), "at least one scripted answer is required");
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answer with `ip`
    pub fn fixed(ip: &str) -> Self {
        Self::new(vec![Ok(ip.parse().expect("valid IPv4 literal"))])
    }

    /// Get the number of times current() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let mut answers = self.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers.front().cloned().unwrap()
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// Provider operations that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindZone,
    FindRecord,
    UpdateRecord,
}

#[derive(Default)]
struct ProviderState {
    zones: Mutex<HashMap<String, ZoneId>>,
    records: Mutex<HashMap<(String, String), PublishedRecord>>,
    failures: Mutex<HashMap<Op, VecDeque<Error>>>,
    updates: Mutex<Vec<(ZoneId, RecordUpdate)>>,
    find_zone_calls: AtomicUsize,
    find_record_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

/// An in-memory DnsProvider that tracks calls
///
/// Clones share state, so a test can keep one handle while the Reconciler
/// owns another.
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<ProviderState>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider holding `home.example.com` in `example.com` with `content`
    pub fn with_published(content: &str) -> Self {
        Self::new()
            .with_zone(ZONE, ZONE_ID)
            .with_record(ZONE_ID, RECORD_ID, RECORD, content)
    }

    pub fn with_zone(self, name: &str, id: &str) -> Self {
        self.state
            .zones
            .lock()
            .unwrap()
            .insert(name.to_string(), ZoneId::new(id));
        self
    }

    pub fn with_record(self, zone_id: &str, id: &str, name: &str, content: &str) -> Self {
        self.state.records.lock().unwrap().insert(
            (zone_id.to_string(), name.to_string()),
            PublishedRecord {
                id: RecordId::new(id),
                name: name.to_string(),
                content: content.to_string(),
            },
        );
        self
    }

    /// Make the next call to `op` fail with `error`
    pub fn fail_next(&self, op: Op, error: Error) {
        self.state
            .failures
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Replace the zone table, e.g. to simulate a zone being re-created
    pub fn replace_zone(&self, name: &str, id: &str) {
        self.state
            .zones
            .lock()
            .unwrap()
            .insert(name.to_string(), ZoneId::new(id));
    }

    /// Move every record of `from` to zone `to`
    pub fn move_records(&self, from: &str, to: &str) {
        let mut records = self.state.records.lock().unwrap();
        let moved: Vec<_> = records
            .keys()
            .filter(|(zone, _)| zone == from)
            .cloned()
            .collect();
        for key in moved {
            if let Some(record) = records.remove(&key) {
                records.insert((to.to_string(), key.1), record);
            }
        }
    }

    pub fn find_zone_calls(&self) -> usize {
        self.state.find_zone_calls.load(Ordering::SeqCst)
    }

    pub fn find_record_calls(&self) -> usize {
        self.state.find_record_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.state.update_calls.load(Ordering::SeqCst)
    }

    /// Total provider calls of any kind
    pub fn total_calls(&self) -> usize {
        self.find_zone_calls() + self.find_record_calls() + self.update_calls()
    }

    /// Every update that was accepted, in order
    pub fn updates(&self) -> Vec<(ZoneId, RecordUpdate)> {
        self.state.updates.lock().unwrap().clone()
    }

    /// Current content of the managed record
    pub fn published(&self, zone_id: &str, name: &str) -> Option<String> {
        self.state
            .records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), name.to_string()))
            .map(|record| record.content.clone())
    }

    fn take_failure(&self, op: Op) -> Option<Error> {
        self.state
            .failures
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(|queue| queue.pop_front())
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_zone(&self, zone_name: &str) -> Result<ZoneId> {
        self.state.find_zone_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_failure(Op::FindZone) {
            return Err(e);
        }

        self.state
            .zones
            .lock()
            .unwrap()
            .get(zone_name)
            .cloned()
            .ok_or_else(|| Error::zone_not_found(zone_name))
    }

    async fn find_record(
        &self,
        zone_id: &ZoneId,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<PublishedRecord> {
        self.state.find_record_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_failure(Op::FindRecord) {
            return Err(e);
        }

        self.state
            .records
            .lock()
            .unwrap()
            .get(&(zone_id.as_str().to_string(), record_name.to_string()))
            .cloned()
            .ok_or_else(|| Error::record_not_found(format!("{} (type: {})", record_name, record_type)))
    }

    async fn update_record(&self, zone_id: &ZoneId, update: &RecordUpdate) -> Result<()> {
        self.state.update_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.take_failure(Op::UpdateRecord) {
            return Err(e);
        }

        let mut records = self.state.records.lock().unwrap();
        let record = records
            .get_mut(&(zone_id.as_str().to_string(), update.name.clone()))
            .ok_or_else(|| Error::record_not_found(update.name.clone()))?;
        record.content = update.content.clone();

        self.state
            .updates
            .lock()
            .unwrap()
            .push((zone_id.clone(), update.clone()));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
