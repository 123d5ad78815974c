//! The session state machine: `Idle -> Ready -> Transferring -> Done`,
//! with any state able to fall to `Interrupted` on a fatal error or
//! channel close.
//!
//! A session holds exactly one active transfer at a time; starting a
//! new file requires completing the current one and returning to
//! `Ready`. Beyond phase, a session owns the file metadata and chunk
//! plan for its current (or most recent) transfer and is the thing
//! that actually drives a [`SendPipeline`]/[`ReceivePipeline`] to
//! completion — callers don't construct those pipelines directly.

use std::sync::Arc;

use crate::chunk_plan::ChunkPlan;
use crate::config::{ReceiveConfig, SendConfig};
use crate::error::{Error, Result};
use crate::receive::ReceivePipeline;
use crate::send::SendPipeline;
use crate::sink::SinkFile;
use crate::source::SourceFile;
use crate::stats::TransferStats;
use crate::transport::Transport;

/// Which end of the transfer this session represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

/// The session's current phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No peer paired yet.
    Idle,
    /// Paired and ready to start a transfer.
    Ready,
    /// A transfer is actively running.
    Transferring,
    /// The most recent transfer finished successfully.
    Done,
    /// The channel closed or a fatal error occurred; the session
    /// cannot proceed.
    Interrupted { reason: String },
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Interrupted { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Transferring)
    }
}

/// File metadata a session tracks for its current or most recent
/// transfer: the name and total size announced by `file-start`.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
}

/// Tracks the current phase of one paired session, enforces the legal
/// transitions between phases, and owns the chunk plan and pipeline
/// for whichever transfer is active.
pub struct Session {
    pub role: Role,
    phase: Phase,
    file: Option<FileMetadata>,
    plan: Option<ChunkPlan>,
    stats: Option<TransferStats>,
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            phase: Phase::Idle,
            file: None,
            plan: None,
            stats: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// File metadata for the current or most recently run transfer, if
    /// one has started.
    pub fn file(&self) -> Option<&FileMetadata> {
        self.file.as_ref()
    }

    /// The chunk plan for the current or most recently run transfer.
    /// For a [`Role::Receiver`] this is only populated once the
    /// sender's `file-start` frame has arrived.
    pub fn plan(&self) -> Option<&ChunkPlan> {
        self.plan.as_ref()
    }

    /// A snapshot of the most recently completed transfer's final
    /// progress, if any.
    pub fn stats(&self) -> Option<&TransferStats> {
        self.stats.as_ref()
    }

    /// Called once the peer channel is established.
    pub fn mark_ready(&mut self) -> Result<()> {
        match self.phase {
            Phase::Idle | Phase::Done => {
                self.phase = Phase::Ready;
                Ok(())
            }
            _ => Err(Error::InvalidTransition(format!(
                "cannot mark ready from {:?}",
                self.phase
            ))),
        }
    }

    /// Called when a transfer starts.
    fn start_transfer(&mut self) -> Result<()> {
        match self.phase {
            Phase::Ready => {
                self.phase = Phase::Transferring;
                Ok(())
            }
            _ => Err(Error::InvalidTransition(format!(
                "cannot start a transfer from {:?}",
                self.phase
            ))),
        }
    }

    /// Called when the active transfer completes successfully.
    fn complete_transfer(&mut self) -> Result<()> {
        match self.phase {
            Phase::Transferring => {
                self.phase = Phase::Done;
                Ok(())
            }
            _ => Err(Error::InvalidTransition(format!(
                "cannot complete a transfer from {:?}",
                self.phase
            ))),
        }
    }

    /// Called from any phase on a fatal error or channel close.
    pub fn interrupt(&mut self, reason: impl Into<String>) {
        self.phase = Phase::Interrupted {
            reason: reason.into(),
        };
    }

    /// Drive a send to completion: computes the chunk plan up front
    /// (the sender always knows its file's size), hands the transfer
    /// to a [`SendPipeline`], and folds the result back into the
    /// session's phase and stats.
    pub async fn run_send<T: Transport, S: SourceFile>(
        &mut self,
        transport: Arc<T>,
        source: Arc<S>,
        config: SendConfig,
    ) -> Result<TransferStats> {
        self.start_transfer()?;
        self.file = Some(FileMetadata {
            name: source.name().to_string(),
            size: source.size(),
        });
        self.plan = Some(ChunkPlan::new(
            source.size(),
            config.main_chunk_size,
            config.sub_chunk_size,
        ));

        let pipeline = SendPipeline::new(transport, source, config);
        match pipeline.run().await {
            Ok(stats) => {
                self.stats = Some(stats.clone());
                self.complete_transfer()?;
                Ok(stats)
            }
            Err(e) => {
                self.interrupt(e.to_string());
                Err(e)
            }
        }
    }

    /// Drive a receive to completion: hands the transfer to a
    /// [`ReceivePipeline`] and folds the final stats back into the
    /// session. `self.plan()` stays `None` for a receiver: the
    /// `ReceivePipeline` derives its plan privately as `file-start`
    /// arrives and doesn't hand it back out once `run` consumes it,
    /// so a receiving session's chunk geometry is only ever reflected
    /// through `stats()`.
    pub async fn run_receive<T: Transport, K: SinkFile>(
        &mut self,
        transport: Arc<T>,
        sink: K,
        config: ReceiveConfig,
    ) -> Result<K> {
        self.start_transfer()?;

        let pipeline = ReceivePipeline::new(transport, sink, config);
        match pipeline.run().await {
            Ok((sink, stats)) => {
                self.stats = Some(stats);
                self.complete_transfer()?;
                Ok(sink)
            }
            Err(e) => {
                self.interrupt(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::MemorySink;
    use crate::source::test_support::MemorySource;
    use crate::transport::test_support::loopback_pair;

    #[test]
    fn happy_path_transitions() {
        let mut session = Session::new(Role::Sender);
        assert_eq!(session.phase(), &Phase::Idle);
        session.mark_ready().unwrap();
        assert_eq!(session.phase(), &Phase::Ready);
        session.start_transfer().unwrap();
        assert!(session.phase().is_active());
        session.complete_transfer().unwrap();
        assert_eq!(session.phase(), &Phase::Done);
    }

    #[test]
    fn a_new_transfer_can_start_after_done() {
        let mut session = Session::new(Role::Receiver);
        session.mark_ready().unwrap();
        session.start_transfer().unwrap();
        session.complete_transfer().unwrap();
        session.mark_ready().unwrap();
        assert_eq!(session.phase(), &Phase::Ready);
    }

    #[test]
    fn cannot_start_a_transfer_while_idle() {
        let mut session = Session::new(Role::Sender);
        let err = session.start_transfer().unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[test]
    fn interrupt_is_reachable_from_any_phase() {
        let mut session = Session::new(Role::Sender);
        session.interrupt("channel closed");
        assert!(session.phase().is_terminal());

        let mut session = Session::new(Role::Sender);
        session.mark_ready().unwrap();
        session.start_transfer().unwrap();
        session.interrupt("digest failure budget exceeded");
        assert!(matches!(session.phase(), Phase::Interrupted { .. }));
    }

    #[tokio::test]
    async fn run_send_drives_a_pipeline_and_records_file_metadata() {
        let (sender_transport, receiver_transport) = loopback_pair();
        let data = vec![7u8; 40];
        let expected = data.clone();
        let source = Arc::new(MemorySource {
            name: "session.bin".into(),
            bytes: data,
        });

        let receiver = tokio::spawn(async move {
            let sink = MemorySink::new(40);
            let receive = ReceivePipeline::new(receiver_transport, sink, Default::default());
            receive.run().await
        });

        let mut session = Session::new(Role::Sender);
        session.mark_ready().unwrap();
        let config = SendConfig {
            main_chunk_size: 40,
            sub_chunk_size: 20,
            ..Default::default()
        };
        let stats = session
            .run_send(sender_transport, source, config)
            .await
            .unwrap();

        assert_eq!(session.phase(), &Phase::Done);
        assert_eq!(session.file().unwrap().size, 40);
        assert_eq!(session.plan().unwrap().total_sub_chunks(), 2);
        assert_eq!(stats.sub_chunks_acked, 2);

        let (sink, _stats) = receiver.await.unwrap().unwrap();
        assert_eq!(sink.bytes, expected);
    }

    #[tokio::test]
    async fn run_receive_drives_a_pipeline_and_records_stats() {
        let (sender_transport, receiver_transport) = loopback_pair();
        let data = vec![3u8; 20];
        let expected = data.clone();
        let source = Arc::new(MemorySource {
            name: "session-recv.bin".into(),
            bytes: data,
        });

        let sender = tokio::spawn(async move {
            let pipeline = SendPipeline::new(
                sender_transport,
                source,
                SendConfig {
                    main_chunk_size: 20,
                    sub_chunk_size: 20,
                    ..Default::default()
                },
            );
            pipeline.run().await
        });

        let mut session = Session::new(Role::Receiver);
        session.mark_ready().unwrap();
        let sink = session
            .run_receive(receiver_transport, MemorySink::new(20), Default::default())
            .await
            .unwrap();

        assert_eq!(session.phase(), &Phase::Done);
        assert_eq!(session.stats().unwrap().sub_chunks_acked, 1);
        assert_eq!(sink.bytes, expected);

        sender.await.unwrap().unwrap();
    }
}
