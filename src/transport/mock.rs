//! In-memory transport for tests and simulation.
//!
//! [`MockTransport`] records every control transfer, answers queries from
//! canned responses or a handler closure, feeds bulk IN reads from a byte
//! queue (or an endless generator) and collects bulk OUT data. Failures can be
//! injected per command or for the next bulk transfer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::UsbTransport;
use crate::error::{Result, UlError};

/// A recorded control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `send_cmd`
    Send {
        /// Vendor request
        request: u8,
        /// wValue
        value: u16,
        /// wIndex
        index: u16,
        /// Payload
        data: Vec<u8>,
    },
    /// `query_cmd`
    Query {
        /// Vendor request
        request: u8,
        /// wValue
        value: u16,
        /// wIndex
        index: u16,
        /// Requested length
        len: usize,
    },
}

impl TransportCall {
    /// Vendor request byte of the call.
    pub fn request(&self) -> u8 {
        match self {
            Self::Send { request, .. } | Self::Query { request, .. } => *request,
        }
    }
}

type QueryHandler = Box<dyn FnMut(u8, u16, u16, &mut [u8]) -> Option<Result<usize>> + Send>;
type BulkSource = Box<dyn FnMut(&mut [u8]) -> usize + Send>;

/// Scriptable [`UsbTransport`].
pub struct MockTransport {
    connected: AtomicBool,
    max_packet: usize,
    calls: Mutex<Vec<TransportCall>>,
    responses: Mutex<HashMap<u8, Vec<u8>>>,
    query_handler: Mutex<Option<QueryHandler>>,
    command_failures: Mutex<HashMap<u8, UlError>>,
    bulk_in_queue: Mutex<VecDeque<u8>>,
    bulk_in_ready: Condvar,
    bulk_in_source: Mutex<Option<BulkSource>>,
    bulk_in_failure: Mutex<Option<UlError>>,
    bulk_out_data: Mutex<Vec<u8>>,
    bulk_out_failure: Mutex<Option<UlError>>,
    bulk_out_capacity: usize,
}

impl MockTransport {
    /// Connected transport with 512-byte bulk packets.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            max_packet: 512,
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            query_handler: Mutex::new(None),
            command_failures: Mutex::new(HashMap::new()),
            bulk_in_queue: Mutex::new(VecDeque::new()),
            bulk_in_ready: Condvar::new(),
            bulk_in_source: Mutex::new(None),
            bulk_in_failure: Mutex::new(None),
            bulk_out_data: Mutex::new(Vec::new()),
            bulk_out_failure: Mutex::new(None),
            bulk_out_capacity: 1 << 20,
        }
    }

    /// Override the bulk endpoint packet size.
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet = size;
        self
    }

    /// Bytes bulk OUT accepts before it starts timing out like a full FIFO.
    pub fn with_bulk_out_capacity(mut self, bytes: usize) -> Self {
        self.bulk_out_capacity = bytes;
        self
    }

    /// Simulate unplugging (or replugging) the device.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        self.bulk_in_ready.notify_all();
    }

    /// Fixed reply for every query with this request byte.
    pub fn set_query_response(&self, request: u8, data: Vec<u8>) {
        self.responses.lock().insert(request, data);
    }

    /// Install a handler consulted before the fixed replies. Returning `None`
    /// falls through to them.
    pub fn set_query_handler<F>(&self, handler: F)
    where
        F: FnMut(u8, u16, u16, &mut [u8]) -> Option<Result<usize>> + Send + 'static,
    {
        *self.query_handler.lock() = Some(Box::new(handler));
    }

    /// Make every send/query with this request byte fail.
    pub fn fail_command(&self, request: u8, err: UlError) {
        self.command_failures.lock().insert(request, err);
    }

    /// Remove an injected command failure.
    pub fn clear_command_failure(&self, request: u8) {
        self.command_failures.lock().remove(&request);
    }

    /// Append bytes to the bulk IN stream.
    pub fn push_bulk_in(&self, data: &[u8]) {
        self.bulk_in_queue.lock().extend(data.iter().copied());
        self.bulk_in_ready.notify_all();
    }

    /// Serve bulk IN reads from a generator once the queue is empty.
    pub fn set_bulk_in_source<F>(&self, source: F)
    where
        F: FnMut(&mut [u8]) -> usize + Send + 'static,
    {
        *self.bulk_in_source.lock() = Some(Box::new(source));
        self.bulk_in_ready.notify_all();
    }

    /// Fail the next bulk IN read.
    pub fn fail_next_bulk_in(&self, err: UlError) {
        *self.bulk_in_failure.lock() = Some(err);
        self.bulk_in_ready.notify_all();
    }

    /// Fail the next bulk OUT write.
    pub fn fail_next_bulk_out(&self, err: UlError) {
        *self.bulk_out_failure.lock() = Some(err);
    }

    /// Bytes still waiting in the bulk IN queue.
    pub fn pending_bulk_in(&self) -> usize {
        self.bulk_in_queue.lock().len()
    }

    /// Everything written to bulk OUT so far.
    pub fn bulk_out_data(&self) -> Vec<u8> {
        self.bulk_out_data.lock().clone()
    }

    /// Recorded control transfers.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Recorded sends with the given request byte.
    pub fn sent(&self, request: u8) -> Vec<TransportCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, TransportCall::Send { .. }) && c.request() == request)
            .cloned()
            .collect()
    }

    /// Payload of the most recent send with the given request byte.
    pub fn last_sent_data(&self, request: u8) -> Option<Vec<u8>> {
        self.sent(request).into_iter().rev().find_map(|c| match c {
            TransportCall::Send { data, .. } => Some(data),
            TransportCall::Query { .. } => None,
        })
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(UlError::DevNotConnected)
        }
    }

    fn check_failure(&self, request: u8) -> Result<()> {
        match self.command_failures.lock().get(&request) {
            Some(err) => Err(*err),
            None => Ok(()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbTransport for MockTransport {
    fn send_cmd(
        &self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<()> {
        self.check_connected()?;
        self.calls.lock().push(TransportCall::Send {
            request,
            value,
            index,
            data: data.to_vec(),
        });
        self.check_failure(request)
    }

    fn query_cmd(
        &self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize> {
        self.check_connected()?;
        self.calls.lock().push(TransportCall::Query {
            request,
            value,
            index,
            len: buf.len(),
        });
        self.check_failure(request)?;

        if let Some(handler) = self.query_handler.lock().as_mut() {
            if let Some(result) = handler(request, value, index, buf) {
                return result;
            }
        }

        buf.fill(0);
        if let Some(reply) = self.responses.lock().get(&request) {
            let n = reply.len().min(buf.len());
            buf[..n].copy_from_slice(&reply[..n]);
        }
        Ok(buf.len())
    }

    fn bulk_in(&self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.check_connected()?;
        if let Some(err) = self.bulk_in_failure.lock().take() {
            return Err(err);
        }

        let mut queue = self.bulk_in_queue.lock();
        if queue.is_empty() {
            if let Some(source) = self.bulk_in_source.lock().as_mut() {
                let n = source(buf);
                trace!(endpoint, n, "Mock bulk in (generated)");
                return Ok(n);
            }
            let timed_out = self.bulk_in_ready.wait_for(&mut queue, timeout).timed_out();
            self.check_connected()?;
            if timed_out && queue.is_empty() {
                return Err(UlError::TimedOut);
            }
            if queue.is_empty() {
                // woken for a failure or a source
                drop(queue);
                if let Some(err) = self.bulk_in_failure.lock().take() {
                    return Err(err);
                }
                return Err(UlError::TimedOut);
            }
        }

        let n = queue.len().min(buf.len());
        for (dst, src) in buf.iter_mut().zip(queue.drain(..n)) {
            *dst = src;
        }
        trace!(endpoint, n, "Mock bulk in");
        Ok(n)
    }

    fn bulk_out(&self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        self.check_connected()?;
        if let Some(err) = self.bulk_out_failure.lock().take() {
            return Err(err);
        }
        let mut out = self.bulk_out_data.lock();
        let room = self.bulk_out_capacity.saturating_sub(out.len());
        if room == 0 {
            drop(out);
            std::thread::sleep(timeout);
            return Err(UlError::TimedOut);
        }
        let n = room.min(data.len());
        out.extend_from_slice(&data[..n]);
        trace!(endpoint, n, "Mock bulk out");
        Ok(n)
    }

    fn max_packet_size(&self, _endpoint: u8) -> usize {
        self.max_packet
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
