//! The sending half of a transfer: announces the file, streams
//! sub-chunks under a backpressure and admission-control gate, and
//! retransmits on nack/retry-request until everything is acked.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::adaptive::AdaptiveTuner;
use crate::chunk_plan::ChunkPlan;
use crate::config::SendConfig;
use crate::error::{Error, Result};
use crate::framing::{ControlFrame, DataFrame, WireFrame};
use crate::integrity::digest_hex;
use crate::source::SourceFile;
use crate::stats::{SpeedTracker, TransferStats};
use crate::time::now_millis;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Pending,
    Inflight,
    Acked,
}

/// Drives the send side of one file transfer to completion.
pub struct SendPipeline<T: Transport, S: SourceFile> {
    transport: Arc<T>,
    source: Arc<S>,
    plan: ChunkPlan,
    config: SendConfig,
    state: HashMap<u32, SenderState>,
    retries: HashMap<u32, u32>,
    /// Sub-chunks waiting to be sent, head-of-queue first. Retried
    /// sub-chunks are reinserted at the front.
    queue: VecDeque<u32>,
    speed: SpeedTracker,
    tuner: Option<AdaptiveTuner>,
}

impl<T: Transport, S: SourceFile> SendPipeline<T, S> {
    pub fn new(transport: Arc<T>, source: Arc<S>, config: SendConfig) -> Self {
        let plan = ChunkPlan::new(source.size(), config.main_chunk_size, config.sub_chunk_size);
        let queue = plan.sub_chunks().map(|s| s.flat_index).collect();
        let state = plan
            .sub_chunks()
            .map(|s| (s.flat_index, SenderState::Pending))
            .collect();
        transport.set_low_water_mark(config.low_water_threshold);
        let tuner = config.adaptive.then(AdaptiveTuner::new);
        Self {
            transport,
            source,
            plan,
            config,
            state,
            retries: HashMap::new(),
            queue,
            speed: SpeedTracker::default(),
            tuner,
        }
    }

    /// A point-in-time progress snapshot.
    pub fn stats(&self) -> TransferStats {
        let acked = self
            .state
            .values()
            .filter(|s| **s == SenderState::Acked)
            .count() as u32;
        let failed = self
            .retries
            .values()
            .filter(|attempts| **attempts > self.config.max_retries)
            .count() as u32;
        TransferStats {
            bytes_total: self.source.size(),
            bytes_completed: self
                .plan
                .sub_chunks()
                .filter(|s| self.state.get(&s.flat_index) == Some(&SenderState::Acked))
                .map(|s| s.len() as u64)
                .sum(),
            sub_chunks_total: self.plan.total_sub_chunks(),
            sub_chunks_acked: acked,
            sub_chunks_failed: failed,
            speed_bps: self.speed.speed_bps(),
        }
    }

    fn inflight_count(&self) -> usize {
        self.state
            .values()
            .filter(|s| **s == SenderState::Inflight)
            .count()
    }

    fn all_acked(&self) -> bool {
        self.state.values().all(|s| *s == SenderState::Acked)
    }

    async fn announce(&self) -> Result<()> {
        self.transport
            .send_control(&ControlFrame::FileStart {
                name: self.source.name().to_string(),
                size: self.source.size(),
                main_chunk_size: self.config.main_chunk_size,
                sub_chunk_size: self.config.sub_chunk_size,
                main_count: self.plan.total_main_chunks(),
                sub_count: self.plan.total_sub_chunks(),
            })
            .await
    }

    async fn send_sub_chunk(&mut self, flat_index: u32) -> Result<()> {
        let sub = *self
            .plan
            .sub_chunk(flat_index)
            .expect("flat_index from our own plan");

        let bytes = self
            .source
            .read_range(sub.start, sub.len())
            .await
            .map_err(|e| match e {
                Error::SourceRead(msg) => Error::SourceRead(msg),
                other => other,
            })?;
        let digest = digest_hex(&bytes);

        self.transport
            .send_control(&ControlFrame::ChunkMetadata {
                flat_index: sub.flat_index,
                main_index: sub.main_index,
                sub_index: sub.sub_index,
                digest_hex: digest,
            })
            .await?;

        self.transport
            .send_data(&DataFrame {
                flat_index: sub.flat_index,
                payload: bytes,
            })
            .await?;

        self.state.insert(flat_index, SenderState::Inflight);
        Ok(())
    }

    fn requeue_for_retry(&mut self, flat_index: u32) -> Result<()> {
        if let Some(tuner) = &mut self.tuner {
            tuner.on_retry();
        }
        let attempts = self.retries.entry(flat_index).or_insert(0);
        *attempts += 1;
        if *attempts > self.config.max_retries {
            return Err(Error::FatalTransfer {
                flat_index,
                retries: *attempts,
            });
        }
        self.state.insert(flat_index, SenderState::Pending);
        self.queue.push_front(flat_index);
        Ok(())
    }

    fn handle_ack(&mut self, flat_index: u32, ok: bool) -> Result<()> {
        if ok {
            self.state.insert(flat_index, SenderState::Acked);
            if let Some(sub) = self.plan.sub_chunk(flat_index) {
                self.speed.record(sub.len() as u64, now_millis());
            }
            if let Some(tuner) = &mut self.tuner {
                tuner.on_ack();
            }
            Ok(())
        } else {
            self.requeue_for_retry(flat_index)
        }
    }

    /// Run the pipeline to completion: announce, stream every
    /// sub-chunk under the backpressure/admission gates, retry on
    /// nack, and hold `transfer-complete` until every sub-chunk is
    /// acked. Returns a final progress snapshot.
    pub async fn run(mut self) -> Result<TransferStats> {
        self.announce().await?;

        if self.plan.total_sub_chunks() == 0 {
            self.transport
                .send_control(&ControlFrame::TransferComplete)
                .await?;
            return Ok(self.stats());
        }

        loop {
            if self.all_acked() {
                break;
            }

            // Drain any pending acks/nacks without blocking if the
            // admission gate is full or the queue is drained, so we
            // make progress even when there's nothing left to send.
            if self.inflight_count() >= self.config.max_concurrent_sends || self.queue.is_empty() {
                match self.transport.recv().await? {
                    Some(WireFrame::Control(ControlFrame::ChunkAck { flat_index, ok })) => {
                        self.handle_ack(flat_index, ok)?;
                    }
                    Some(WireFrame::Control(ControlFrame::ChunkNack { flat_indexes })) => {
                        for flat_index in flat_indexes {
                            self.requeue_for_retry(flat_index)?;
                        }
                    }
                    Some(WireFrame::Control(ControlFrame::RetryRequest { flat_index })) => {
                        self.requeue_for_retry(flat_index)?;
                    }
                    Some(_) => {}
                    None => return Err(Error::ChannelClosed),
                }
                continue;
            }

            // Backpressure gate (spec.md §4.4c): only wait on the
            // low-water event once the buffer has actually crossed the
            // high-water mark, and recheck in a loop in case the event
            // fires before the buffer has drained enough.
            while self.transport.buffered_amount() > self.config.high_water_mark {
                self.transport.wait_low_water().await;
            }

            let flat_index = match self.queue.pop_front() {
                Some(i) => i,
                None => continue,
            };

            if let Some(tuner) = &self.tuner {
                let delay = tuner.delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match self.send_sub_chunk(flat_index).await {
                Ok(()) => {}
                Err(Error::TransientSend(_)) => {
                    self.queue.push_front(flat_index);
                }
                Err(other) => return Err(other),
            }
        }

        self.transport
            .send_control(&ControlFrame::TransferComplete)
            .await?;
        Ok(self.stats())
    }
}
