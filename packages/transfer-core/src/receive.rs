//! The receiving half of a transfer: correlates metadata and data
//! frames (robust to reordering between different sub-chunks),
//! verifies digests, acks or nacks, and assembles verified payloads
//! in flat-index order.

use std::collections::{HashMap, HashSet};

use crate::chunk_plan::ChunkPlan;
use crate::config::ReceiveConfig;
use crate::error::{Error, Result};
use crate::framing::{ControlFrame, WireFrame};
use crate::integrity::verify;
use crate::sink::SinkFile;
use crate::stats::{SpeedTracker, TransferStats};
use crate::time::now_millis;
use crate::transport::Transport;

/// Metadata announced for a sub-chunk whose data frame hasn't arrived
/// yet.
struct PendingMetadata {
    digest_hex: String,
}

/// Drives the receive side of one file transfer to completion,
/// returning the sink once every sub-chunk has been verified and
/// written.
pub struct ReceivePipeline<T: Transport, K: SinkFile> {
    transport: std::sync::Arc<T>,
    sink: K,
    config: ReceiveConfig,
    plan: Option<ChunkPlan>,
    pending_metadata: HashMap<u32, PendingMetadata>,
    pending_payload: HashMap<u32, Vec<u8>>,
    verified: HashSet<u32>,
    failed: u32,
    speed: SpeedTracker,
}

impl<T: Transport, K: SinkFile> ReceivePipeline<T, K> {
    pub fn new(transport: std::sync::Arc<T>, sink: K, config: ReceiveConfig) -> Self {
        Self {
            transport,
            sink,
            config,
            plan: None,
            pending_metadata: HashMap::new(),
            pending_payload: HashMap::new(),
            verified: HashSet::new(),
            failed: 0,
            speed: SpeedTracker::default(),
        }
    }

    fn is_complete(&self) -> bool {
        match &self.plan {
            Some(plan) => self.verified.len() as u32 == plan.total_sub_chunks(),
            None => false,
        }
    }

    /// A point-in-time progress snapshot.
    pub fn stats(&self) -> TransferStats {
        let (bytes_total, sub_chunks_total) = match &self.plan {
            Some(plan) => (plan.total_size, plan.total_sub_chunks()),
            None => (0, 0),
        };
        let bytes_completed = self
            .plan
            .as_ref()
            .map(|plan| {
                self.verified
                    .iter()
                    .filter_map(|i| plan.sub_chunk(*i))
                    .map(|s| s.len() as u64)
                    .sum()
            })
            .unwrap_or(0);
        TransferStats {
            bytes_total,
            bytes_completed,
            sub_chunks_total,
            sub_chunks_acked: self.verified.len() as u32,
            sub_chunks_failed: self.failed,
            speed_bps: self.speed.speed_bps(),
        }
    }

    async fn try_verify(&mut self, flat_index: u32) -> Result<()> {
        let digest_hex = match self.pending_metadata.get(&flat_index) {
            Some(m) => m.digest_hex.clone(),
            None => return Ok(()),
        };
        let payload = match self.pending_payload.get(&flat_index) {
            Some(p) => p,
            None => return Ok(()),
        };

        let digest_ok = verify(payload, &digest_hex);
        let plan = self.plan.as_ref().expect("plan set before frames arrive");
        let sub = *plan.sub_chunk(flat_index).ok_or(Error::PlanMismatch {
            announced: plan.total_sub_chunks(),
            derived: flat_index,
        })?;
        let length_ok = payload.len() as u32 == sub.len();

        if digest_ok && length_ok {
            let payload = self.pending_payload.remove(&flat_index).unwrap();
            self.pending_metadata.remove(&flat_index);
            self.sink.write_at(sub.start, &payload).await?;
            self.speed.record(sub.len() as u64, now_millis());
            self.verified.insert(flat_index);
            self.transport
                .send_control(&ControlFrame::ChunkAck {
                    flat_index,
                    ok: true,
                })
                .await
        } else {
            if !digest_ok && length_ok {
                tracing::debug!(flat_index, "digest mismatch");
            } else if digest_ok {
                tracing::warn!(
                    flat_index,
                    expected = sub.len(),
                    actual = payload.len() as u32,
                    "sub-chunk assembly length mismatch despite matching digest"
                );
            }
            self.pending_payload.remove(&flat_index);
            self.pending_metadata.remove(&flat_index);
            self.failed += 1;
            // spec.md §4.5 step 4: drop the payload, forget the
            // pending digest, and ask for a fresh copy rather than
            // acking negatively — `chunk-ack` only ever carries a
            // positive outcome on this wire.
            self.transport
                .send_control(&ControlFrame::RetryRequest { flat_index })
                .await
        }
    }

    async fn send_gap_nack(&self) -> Result<()> {
        let plan = match &self.plan {
            Some(p) => p,
            None => return Ok(()),
        };
        let missing: Vec<u32> = plan
            .sub_chunks()
            .map(|s| s.flat_index)
            .filter(|i| !self.verified.contains(i))
            .take(self.config.max_nack_batch)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.transport
            .send_control(&ControlFrame::ChunkNack {
                flat_indexes: missing,
            })
            .await
    }

    /// Run until every sub-chunk has been verified and written, then
    /// return the sink alongside a final progress snapshot.
    pub async fn run(mut self) -> Result<(K, TransferStats)> {
        loop {
            if self.is_complete() {
                let stats = self.stats();
                self.sink.finish().await?;
                return Ok((self.sink, stats));
            }

            let next = tokio::time::timeout(
                self.config.gap_detection_grace,
                self.transport.recv(),
            )
            .await;

            let frame = match next {
                Ok(result) => result?,
                Err(_timeout) => {
                    self.send_gap_nack().await?;
                    continue;
                }
            };

            match frame {
                Some(WireFrame::Control(ControlFrame::FileStart {
                    size,
                    main_chunk_size,
                    sub_chunk_size,
                    sub_count,
                    ..
                })) => {
                    let plan = ChunkPlan::derive_for_receiver(
                        size,
                        sub_count,
                        main_chunk_size,
                        sub_chunk_size,
                    )?;
                    self.plan = Some(plan);
                }
                Some(WireFrame::Control(ControlFrame::ChunkMetadata {
                    flat_index,
                    digest_hex,
                    ..
                })) => {
                    self.pending_metadata
                        .insert(flat_index, PendingMetadata { digest_hex });
                    self.try_verify(flat_index).await?;
                }
                Some(WireFrame::Data(data)) => {
                    self.pending_payload.insert(data.flat_index, data.payload);
                    self.try_verify(data.flat_index).await?;
                }
                Some(WireFrame::Control(ControlFrame::TransferComplete)) => {
                    if self.is_complete() {
                        let stats = self.stats();
                        self.sink.finish().await?;
                        return Ok((self.sink, stats));
                    }
                    // Sender believes every sub-chunk is acked but we
                    // disagree; let the next gap-detection pass or
                    // incoming frame resolve it.
                }
                Some(_) => {}
                None => return Err(Error::ChannelClosed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::MemorySink;
    use crate::transport::test_support::loopback_pair;

    #[tokio::test]
    async fn rejects_digest_mismatch_with_a_retry_request() {
        let (sender, receiver) = loopback_pair();
        let sink = MemorySink::new(10);
        let receive = ReceivePipeline::new(receiver, sink, Default::default());
        let handle = tokio::spawn(receive.run());

        sender
            .send_control(&ControlFrame::FileStart {
                name: "f".into(),
                size: 10,
                main_chunk_size: 10,
                sub_chunk_size: 10,
                main_count: 1,
                sub_count: 1,
            })
            .await
            .unwrap();
        sender
            .send_control(&ControlFrame::ChunkMetadata {
                flat_index: 0,
                main_index: 0,
                sub_index: 0,
                digest_hex: "0".repeat(64),
            })
            .await
            .unwrap();
        sender
            .send_data(&crate::framing::DataFrame {
                flat_index: 0,
                payload: vec![1u8; 10],
            })
            .await
            .unwrap();

        let reply = sender.recv().await.unwrap().unwrap();
        match reply {
            WireFrame::Control(ControlFrame::RetryRequest { flat_index }) => {
                assert_eq!(flat_index, 0)
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        drop(sender);
        // The pipeline won't complete since the sub-chunk never verified;
        // abort the still-pending task rather than block the test.
        handle.abort();
    }

    #[tokio::test]
    async fn metadata_arriving_after_data_still_verifies() {
        let (sender, receiver) = loopback_pair();
        let sink = MemorySink::new(4);
        let receive = ReceivePipeline::new(receiver, sink, Default::default());
        let handle = tokio::spawn(receive.run());

        let payload = vec![9u8; 4];
        let digest = crate::integrity::digest_hex(&payload);

        sender
            .send_control(&ControlFrame::FileStart {
                name: "f".into(),
                size: 4,
                main_chunk_size: 4,
                sub_chunk_size: 4,
                main_count: 1,
                sub_count: 1,
            })
            .await
            .unwrap();
        // Data frame arrives before its metadata.
        sender
            .send_data(&crate::framing::DataFrame {
                flat_index: 0,
                payload: payload.clone(),
            })
            .await
            .unwrap();
        sender
            .send_control(&ControlFrame::ChunkMetadata {
                flat_index: 0,
                main_index: 0,
                sub_index: 0,
                digest_hex: digest,
            })
            .await
            .unwrap();

        let ack = sender.recv().await.unwrap().unwrap();
        match ack {
            WireFrame::Control(ControlFrame::ChunkAck { ok, .. }) => assert!(ok),
            other => panic!("unexpected frame: {other:?}"),
        }

        sender
            .send_control(&ControlFrame::TransferComplete)
            .await
            .unwrap();
        let (sink, _stats) = handle.await.unwrap().unwrap();
        assert_eq!(sink.bytes, payload);
    }

    #[tokio::test]
    async fn stats_count_verified_and_failed_sub_chunks() {
        let (sender, receiver) = loopback_pair();
        let sink = MemorySink::new(8);
        let mut receive = ReceivePipeline::new(receiver, sink, Default::default());

        sender
            .send_control(&ControlFrame::FileStart {
                name: "f".into(),
                size: 8,
                main_chunk_size: 8,
                sub_chunk_size: 4,
                main_count: 1,
                sub_count: 2,
            })
            .await
            .unwrap();
        match receive.transport.recv().await.unwrap().unwrap() {
            WireFrame::Control(ControlFrame::FileStart {
                size,
                main_chunk_size,
                sub_chunk_size,
                sub_count,
                ..
            }) => {
                receive.plan = Some(
                    ChunkPlan::derive_for_receiver(size, sub_count, main_chunk_size, sub_chunk_size)
                        .unwrap(),
                );
            }
            other => panic!("unexpected frame: {other:?}"),
        }

        let good = vec![1u8; 4];
        let digest = crate::integrity::digest_hex(&good);
        receive
            .pending_metadata
            .insert(0, PendingMetadata { digest_hex: digest });
        receive.pending_payload.insert(0, good);
        receive.try_verify(0).await.unwrap();
        sender.recv().await.unwrap().unwrap();

        receive.pending_metadata.insert(
            1,
            PendingMetadata {
                digest_hex: "0".repeat(64),
            },
        );
        receive.pending_payload.insert(1, vec![2u8; 4]);
        receive.try_verify(1).await.unwrap();
        sender.recv().await.unwrap().unwrap();

        let stats = receive.stats();
        assert_eq!(stats.sub_chunks_acked, 1);
        assert_eq!(stats.sub_chunks_failed, 1);
        assert_eq!(stats.bytes_completed, 4);
    }
}
