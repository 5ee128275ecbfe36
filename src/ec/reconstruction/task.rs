//! Reconstruction Task: the engine.
//!
//! Executes end-to-end on one Task Pool worker: a geometry-aware windowed
//! main loop, the minimum-sources scheduler, decode assembly, and transfer.
//! Not re-entrant; a fresh task is built per reconstruction order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tracing::{debug, instrument, warn};

use crate::domain::ports::{
    BlockTokenIssuer, CorruptionReport, CorruptionSink, PeerAddress, PeerConnectionFactory,
};
use crate::ec::encoder::EcDecoder;
use crate::ec::geometry::{
    construct_internal_block_id, internal_block_length, min_required_sources, slice_size,
    ErasureCodingPolicy,
};
use crate::ec::reconstruction::order::{ReconstructionOrder, Target};
use crate::ec::reconstruction::reader_pool::ReaderPool;
use crate::error::{Error, Result};
use crate::net::packet::ChecksumDescriptor;
use crate::net::remote_reader::RemoteBlockReader;
use crate::net::target_channel::TargetChannel;

/// Per-source state a task owns for its whole run. `channel` is `None` both before the reader has ever been
/// opened and after it has been closed for good; `scheduleNewRead` treats
/// those two cases identically, free to (re)open.
struct StripedReader {
    internal_index: usize,
    peer: PeerAddress,
    internal_block_id: u64,
    channel: Option<RemoteBlockReader>,
    buffer: Vec<u8>,
    filled: usize,
}

/// Per-target outbound state.
struct TaskTarget {
    internal_index: usize,
    peer: PeerAddress,
    channel: Option<TargetChannel>,
}

impl TaskTarget {
    fn is_alive(&self) -> bool {
        self.channel.as_ref().is_some_and(TargetChannel::is_alive)
    }
}

/// Outcome of one slice read submitted to the Reader Pool: carries the
/// reader and buffer back so they can be put back in their slot (or torn
/// down) regardless of whether the read succeeded.
struct SliceReadOutcome {
    reader: RemoteBlockReader,
    buffer: Vec<u8>,
    result: Result<usize>,
}

/// What `scheduleNewRead` found for a vacated slot.
enum Replacement {
    /// The candidate's internal block is already exhausted for this
    /// window; it is satisfied without touching the network.
    Instant(usize),
    /// A real read was submitted; the reader index will surface again as a
    /// completion.
    Pending(BoxFuture<'static, (usize, std::result::Result<SliceReadOutcome, tokio::time::error::Elapsed>)>),
    /// No candidate could be found at all.
    None,
}

pub struct ReconstructionTask {
    extended_block: crate::ec::reconstruction::order::ExtendedBlock,
    policy: ErasureCodingPolicy,
    live_sources: Vec<crate::ec::reconstruction::order::LiveSource>,
    target_specs: Vec<Target>,
    connector: Arc<dyn PeerConnectionFactory>,
    tokens: Arc<dyn BlockTokenIssuer>,
    corruption_sink: Arc<dyn CorruptionSink>,
    reader_pool: Arc<ReaderPool>,
    slice_read_timeout: Duration,
    raw_buffer_size: u64,
    min_required_sources: usize,
}

impl ReconstructionTask {
    /// Builds a task from one reconstruction order. Returns `Ok(None)` when
    /// every target has zero length ("no valid target to reconstruct");
    /// the Worker drops such orders with a warning instead of enqueuing
    /// them.
    pub fn new(
        order: ReconstructionOrder,
        connector: Arc<dyn PeerConnectionFactory>,
        tokens: Arc<dyn BlockTokenIssuer>,
        corruption_sink: Arc<dyn CorruptionSink>,
        reader_pool: Arc<ReaderPool>,
        slice_read_timeout: Duration,
        raw_buffer_size: u64,
    ) -> Result<Option<Self>> {
        order.validate().map_err(Error::InvalidEcConfig)?;

        let block_length = order.extended_block.block_length;
        let policy = order.policy;

        let no_valid_targets = order
            .targets
            .iter()
            .all(|t| internal_block_length(block_length, &policy, t.internal_index) == 0);
        if no_valid_targets {
            return Ok(None);
        }

        let min_required = min_required_sources(block_length, &policy);

        Ok(Some(Self {
            extended_block: order.extended_block,
            policy,
            live_sources: order.live_sources,
            target_specs: order.targets,
            connector,
            tokens,
            corruption_sink,
            reader_pool,
            slice_read_timeout,
            raw_buffer_size,
            min_required_sources: min_required,
        }))
    }

    fn wire_block_id(&self, internal_index: usize) -> u64 {
        construct_internal_block_id(
            self.extended_block.pool_id,
            self.extended_block.block_id,
            self.extended_block.generation_stamp,
            internal_index,
        )
        .block_id
    }

    /// Runs the task end-to-end. Marks itself
    /// fatal-to-this-task-only on any unrecoverable error; the Worker never sees a panic propagate from
    /// here, only this `Result`.
    #[instrument(skip(self), fields(block_id = self.extended_block.block_id))]
    pub async fn run(self) -> Result<()> {
        let block_length = self.extended_block.block_length;
        let total_units = self.policy.total_units();

        let live_idx: HashSet<usize> = self.live_sources.iter().map(|s| s.internal_index).collect();
        let target_idx: HashSet<usize> = self.target_specs.iter().map(|t| t.internal_index).collect();

        let mut zero_stripe_indices = Vec::new();
        for i in 0..total_units {
            if live_idx.contains(&i) {
                continue;
            }
            if internal_block_length(block_length, &self.policy, i) == 0 {
                // A zero-length target has nothing to rebuild (transfer_window
                // will skip it regardless), but it must still fill a
                // zero-stripe slot rather than stay an erased `None`, or the
                // decoder sees fewer than D present columns and fails.
                zero_stripe_indices.push(i);
                continue;
            }
            if target_idx.contains(&i) {
                continue;
            }
            // Any remaining index (missing, nonzero length, no assigned
            // target) stays an implicit erased slot in the decode array
            // below; nothing reads its reconstructed bytes.
        }

        let max_target_length = self
            .target_specs
            .iter()
            .map(|t| internal_block_length(block_length, &self.policy, t.internal_index))
            .max()
            .unwrap_or(0);

        let mut readers: Vec<Option<StripedReader>> =
            (0..self.live_sources.len()).map(|_| None).collect();
        let mut success_list = self.seed_success_list(&mut readers).await?;

        let checksum_descriptor = readers[success_list[0]]
            .as_ref()
            .expect("seeded reader must be present")
            .channel
            .as_ref()
            .expect("seeded reader must be open")
            .checksum_descriptor();
        let window_cap =
            slice_size(self.raw_buffer_size, checksum_descriptor.bytes_per_checksum as u64) as usize;
        for r in readers.iter_mut().flatten() {
            r.buffer.resize(window_cap, 0);
        }
        let zero_buffer = vec![0u8; window_cap];

        let mut targets = Vec::with_capacity(self.target_specs.len());
        for spec in &self.target_specs {
            targets.push(self.open_target(spec, checksum_descriptor).await);
        }

        let decoder = EcDecoder::new(self.policy.data_units, self.policy.parity_units)?;

        let mut pos_in_block = 0u64;
        while pos_in_block < max_target_length {
            let window = std::cmp::min(window_cap as u64, max_target_length - pos_in_block) as usize;

            success_list = self
                .read_min_sources(&mut readers, &success_list, pos_in_block, window, window_cap)
                .await?;

            let mut shards = self.reconstruct_window(
                &decoder,
                &readers,
                &success_list,
                &zero_stripe_indices,
                &zero_buffer,
                window,
                total_units,
            )?;

            self.transfer_window(&mut targets, &mut shards, pos_in_block, block_length)
                .await?;

            pos_in_block += window as u64;
        }

        for t in targets.iter_mut() {
            if let Some(channel) = t.channel.as_mut() {
                if channel.is_alive() {
                    if let Err(e) = channel.send_terminator().await {
                        warn!(peer = %t.peer, error = %e, "failed to send terminator packet");
                    }
                }
            }
        }
        for t in targets {
            if let Some(channel) = t.channel {
                channel.close().await;
            }
        }
        for r in readers.into_iter().flatten() {
            if let Some(channel) = r.channel {
                channel.close().await;
            }
        }

        Ok(())
    }

    /// Seeds `success_list` by trying live sources in order until
    /// `min_required_sources` readers successfully open.
    async fn seed_success_list(&self, readers: &mut [Option<StripedReader>]) -> Result<Vec<usize>> {
        let mut success = Vec::with_capacity(self.min_required_sources);
        for (m, ls) in self.live_sources.iter().enumerate() {
            if success.len() == self.min_required_sources {
                break;
            }
            let ibid = self.wire_block_id(ls.internal_index);
            match RemoteBlockReader::open(&self.connector, &self.tokens, ls.peer.clone(), ibid, 0).await
            {
                Ok(channel) => {
                    readers[m] = Some(StripedReader {
                        internal_index: ls.internal_index,
                        peer: ls.peer.clone(),
                        internal_block_id: ibid,
                        channel: Some(channel),
                        buffer: Vec::new(),
                        filled: 0,
                    });
                    success.push(m);
                }
                Err(e) => debug!(peer = %ls.peer, error = %e, "failed to open source while seeding"),
            }
        }
        if success.len() < self.min_required_sources {
            return Err(Error::InsufficientSources {
                available: success.len(),
                required: self.min_required_sources,
            });
        }
        Ok(success)
    }

    async fn open_target(&self, spec: &Target, checksum_descriptor: ChecksumDescriptor) -> TaskTarget {
        let ibid = self.wire_block_id(spec.internal_index);
        let source_descriptor = format!("block-group-{}", self.extended_block.block_id);
        match TargetChannel::open(
            &self.connector,
            &self.tokens,
            spec.peer.clone(),
            ibid,
            spec.storage_class.clone(),
            source_descriptor,
            checksum_descriptor,
        )
        .await
        {
            Ok(channel) => TaskTarget {
                internal_index: spec.internal_index,
                peer: spec.peer.clone(),
                channel: Some(channel),
            },
            Err(e) => {
                warn!(peer = %spec.peer, error = %e, "failed to open target, target is dead on arrival");
                TaskTarget {
                    internal_index: spec.internal_index,
                    peer: spec.peer.clone(),
                    channel: None,
                }
            }
        }
    }

    /// Submits one slice read to the Reader Pool and wraps it with the
    /// configured slice-read timeout, tagged with its reader index so the
    /// completion multiplexer can route the outcome back to the right slot.
    async fn submit_slice_read(
        &self,
        reader_idx: usize,
        channel: RemoteBlockReader,
        buffer: Vec<u8>,
        len: usize,
    ) -> BoxFuture<'static, (usize, std::result::Result<SliceReadOutcome, tokio::time::error::Elapsed>)>
    {
        let timeout = self.slice_read_timeout;
        let job = async move {
            let mut channel = channel;
            let mut buffer = buffer;
            let result = channel.read_slice(&mut buffer[..len], len).await;
            SliceReadOutcome { reader: channel, buffer, result }
        };
        let submitted = self.reader_pool.submit(job).await;
        async move { (reader_idx, tokio::time::timeout(timeout, submitted).await) }.boxed()
    }

    /// The windowed minimum-sources read scheduler: drives the
    /// previous iteration's `success_list` ("stickiness"), routes around
    /// failed or slow readers via `scheduleNewRead`, and returns as soon as
    /// `min_required_sources` completions have arrived.
    async fn read_min_sources(
        &self,
        readers: &mut [Option<StripedReader>],
        success_list: &[usize],
        pos_in_block: u64,
        window: usize,
        buffer_capacity: usize,
    ) -> Result<Vec<usize>> {
        let mut new_success = Vec::with_capacity(self.min_required_sources);
        let mut corruption = Vec::new();
        let mut used: HashSet<usize> = HashSet::new();
        let mut pending: FuturesUnordered<
            BoxFuture<'static, (usize, std::result::Result<SliceReadOutcome, tokio::time::error::Elapsed>)>,
        > = FuturesUnordered::new();

        for &j in success_list {
            used.insert(j);
            let remaining = {
                let reader = readers[j].as_ref().expect("success list entry must be allocated");
                internal_block_length(self.extended_block.block_length, &self.policy, reader.internal_index)
                    .saturating_sub(pos_in_block)
            };
            let len = std::cmp::min(window as u64, remaining) as usize;
            if len == 0 {
                if let Some(r) = readers[j].as_mut() {
                    r.filled = 0;
                }
                new_success.push(j);
                continue;
            }
            let reader = readers[j].as_mut().expect("success list entry must be allocated");
            let channel = reader.channel.take().expect("sticky reader must have an open channel");
            let buf = std::mem::take(&mut reader.buffer);
            pending.push(self.submit_slice_read(j, channel, buf, len).await);
        }

        while new_success.len() < self.min_required_sources {
            let Some((j, outcome)) = pending.next().await else {
                break;
            };
            match outcome {
                Err(_elapsed) => {
                    warn!(reader_idx = j, "slice read timed out, scheduling replacement");
                    self.apply_replacement(
                        readers,
                        &mut used,
                        pos_in_block,
                        window,
                        buffer_capacity,
                        &mut new_success,
                        &mut pending,
                    )
                    .await?;
                }
                Ok(SliceReadOutcome { reader: channel, buffer, result }) => match result {
                    Ok(filled) => {
                        if let Some(r) = readers[j].as_mut() {
                            r.channel = Some(channel);
                            r.buffer = buffer;
                            r.filled = filled;
                        }
                        new_success.push(j);
                    }
                    Err(Error::ChecksumMismatch { peer, .. }) => {
                        let internal_index =
                            readers[j].as_ref().map(|r| r.internal_index).unwrap_or_default();
                        corruption.push(CorruptionReport {
                            block_id: self.extended_block.block_id,
                            internal_index,
                            peer: PeerAddress::new(peer),
                        });
                        if let Some(r) = readers[j].as_mut() {
                            r.buffer = buffer;
                        }
                        channel.close().await;
                        self.apply_replacement(
                            readers,
                            &mut used,
                            pos_in_block,
                            window,
                            buffer_capacity,
                            &mut new_success,
                            &mut pending,
                        )
                        .await?;
                    }
                    Err(e) => {
                        warn!(reader_idx = j, error = %e, "slice read failed, scheduling replacement");
                        if let Some(r) = readers[j].as_mut() {
                            r.buffer = buffer;
                        }
                        channel.close().await;
                        self.apply_replacement(
                            readers,
                            &mut used,
                            pos_in_block,
                            window,
                            buffer_capacity,
                            &mut new_success,
                            &mut pending,
                        )
                        .await?;
                    }
                },
            }
        }
        // Best-effort cancellation: dropping `pending` gives up on the
        // remaining completions. Reads already spawned onto the Reader
        // Pool keep running to completion in the background; their
        // results, once this function has returned, are simply never
        // observed.
        drop(pending);

        // Flushed unconditionally, win or lose: every corruption observed
        // this iteration must reach the controller regardless of task
        // success, including the case where the task is about to fail with
        // `InsufficientSources` below.
        if !corruption.is_empty() {
            let _ = self.corruption_sink.report(corruption).await;
        }

        if new_success.len() < self.min_required_sources {
            return Err(Error::InsufficientSources {
                available: new_success.len(),
                required: self.min_required_sources,
            });
        }
        Ok(new_success)
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_replacement(
        &self,
        readers: &mut [Option<StripedReader>],
        used: &mut HashSet<usize>,
        pos_in_block: u64,
        window: usize,
        buffer_capacity: usize,
        new_success: &mut Vec<usize>,
        pending: &mut FuturesUnordered<
            BoxFuture<'static, (usize, std::result::Result<SliceReadOutcome, tokio::time::error::Elapsed>)>,
        >,
    ) -> Result<()> {
        match self
            .schedule_new_read(readers, used, pos_in_block, window, buffer_capacity)
            .await?
        {
            Replacement::Instant(m) => new_success.push(m),
            Replacement::Pending(fut) => pending.push(fut),
            Replacement::None => {}
        }
        Ok(())
    }

    /// `scheduleNewRead`: first tries a source with no
    /// Striped Reader yet, then revisits an existing reader not used this
    /// iteration. Returns `Replacement::None` if nothing can be found; the
    /// caller's outer `min_required_sources` check is what ultimately fails
    /// the task if replacements run out.
    async fn schedule_new_read(
        &self,
        readers: &mut [Option<StripedReader>],
        used: &mut HashSet<usize>,
        pos_in_block: u64,
        window: usize,
        buffer_capacity: usize,
    ) -> Result<Replacement> {
        for m in 0..self.live_sources.len() {
            if readers[m].is_some() || used.contains(&m) {
                continue;
            }
            let ls = &self.live_sources[m];
            let remaining = internal_block_length(
                self.extended_block.block_length,
                &self.policy,
                ls.internal_index,
            )
            .saturating_sub(pos_in_block);
            let len = std::cmp::min(window as u64, remaining) as usize;
            let ibid = self.wire_block_id(ls.internal_index);

            if len == 0 {
                readers[m] = Some(StripedReader {
                    internal_index: ls.internal_index,
                    peer: ls.peer.clone(),
                    internal_block_id: ibid,
                    channel: None,
                    buffer: vec![0u8; buffer_capacity],
                    filled: 0,
                });
                used.insert(m);
                return Ok(Replacement::Instant(m));
            }

            match RemoteBlockReader::open(&self.connector, &self.tokens, ls.peer.clone(), ibid, pos_in_block)
                .await
            {
                Ok(channel) => {
                    readers[m] = Some(StripedReader {
                        internal_index: ls.internal_index,
                        peer: ls.peer.clone(),
                        internal_block_id: ibid,
                        channel: Some(channel),
                        buffer: vec![0u8; buffer_capacity],
                        filled: 0,
                    });
                    used.insert(m);
                    let reader = readers[m].as_mut().expect("just inserted");
                    let channel = reader.channel.take().expect("just opened");
                    let buf = std::mem::take(&mut reader.buffer);
                    return Ok(Replacement::Pending(self.submit_slice_read(m, channel, buf, len).await));
                }
                Err(e) => {
                    debug!(peer = %ls.peer, error = %e, "open failed in scheduleNewRead, trying next source");
                }
            }
        }

        for m in 0..readers.len() {
            if used.contains(&m) {
                continue;
            }
            let Some(reader) = readers[m].as_mut() else {
                continue;
            };
            let remaining = internal_block_length(
                self.extended_block.block_length,
                &self.policy,
                reader.internal_index,
            )
            .saturating_sub(pos_in_block);
            let len = std::cmp::min(window as u64, remaining) as usize;

            if len == 0 {
                reader.filled = 0;
                used.insert(m);
                return Ok(Replacement::Instant(m));
            }

            if let Some(old) = reader.channel.take() {
                old.close().await;
            }
            let (peer, internal_block_id) = (reader.peer.clone(), reader.internal_block_id);
            match RemoteBlockReader::open(&self.connector, &self.tokens, peer.clone(), internal_block_id, pos_in_block)
                .await
            {
                Ok(channel) => {
                    used.insert(m);
                    let reader = readers[m].as_mut().expect("still present");
                    let mut buf = std::mem::take(&mut reader.buffer);
                    buf.resize(buffer_capacity, 0);
                    return Ok(Replacement::Pending(self.submit_slice_read(m, channel, buf, len).await));
                }
                Err(e) => {
                    debug!(peer = %peer, error = %e, "reopen failed in scheduleNewRead, trying next source");
                }
            }
        }

        Ok(Replacement::None)
    }

    /// Decode assembly: builds the `D+P`-wide input array from
    /// the success set and zero-stripe slots, leaves every target index
    /// unset, and invokes the decoder once.
    #[allow(clippy::too_many_arguments)]
    fn reconstruct_window(
        &self,
        decoder: &EcDecoder,
        readers: &[Option<StripedReader>],
        success_list: &[usize],
        zero_stripe_indices: &[usize],
        zero_buffer: &[u8],
        window: usize,
        total_units: usize,
    ) -> Result<Vec<Option<Vec<u8>>>> {
        let mut shards: Vec<Option<Vec<u8>>> = vec![None; total_units];

        for &j in success_list {
            let reader = readers[j].as_ref().expect("success list entry must be allocated");
            let mut buf = reader.buffer[..window].to_vec();
            if reader.filled < window {
                for b in &mut buf[reader.filled..] {
                    *b = 0;
                }
            }
            shards[reader.internal_index] = Some(buf);
        }
        for &zi in zero_stripe_indices {
            shards[zi] = Some(zero_buffer[..window].to_vec());
        }

        decoder.reconstruct(&mut shards)?;
        Ok(shards)
    }

    /// Transfer: ships each alive target's reconstructed
    /// bytes, trimmed to however much of the window actually falls within
    /// that target's own internal-block length (the uneven last stripe).
    async fn transfer_window(
        &self,
        targets: &mut [TaskTarget],
        shards: &mut [Option<Vec<u8>>],
        pos_in_block: u64,
        block_length: u64,
    ) -> Result<()> {
        for t in targets.iter_mut() {
            if !t.is_alive() {
                continue;
            }
            let full = shards[t.internal_index].take().unwrap_or_default();
            let remaining =
                internal_block_length(block_length, &self.policy, t.internal_index).saturating_sub(pos_in_block);
            let send_len = std::cmp::min(full.len() as u64, remaining) as usize;
            if send_len == 0 {
                continue;
            }
            if let Some(channel) = t.channel.as_mut() {
                if let Err(e) = channel.send_data(&full[..send_len]).await {
                    warn!(peer = %t.peer, error = %e, "target write failed, target is now dead");
                }
            }
        }

        if targets.iter().all(|t| !t.is_alive()) {
            return Err(Error::AllTargetsDead {
                block_id: self.extended_block.block_id,
            });
        }
        Ok(())
    }
}
