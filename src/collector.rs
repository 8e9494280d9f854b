//! Output collection
//!
//! One reader task per stream drains the child's pipe as bytes arrive
//! and appends each completed line to the job record. Readers run
//! until EOF, which the OS delivers once the child exits and the pipe
//! empties, so a final line without a trailing newline is still
//! captured.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::job::{JobRecord, StreamKind};

/// Spawn a reader task that appends lines from `stream` to the record
///
/// Within one stream, lines land in emission order because a single
/// task owns the pipe. Interleaving across stdout and stderr is
/// best-effort only.
pub fn spawn_stream_reader<R>(
    record: Arc<RwLock<JobRecord>>,
    stream_kind: StreamKind,
    stream: R,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let mut record = record.write().await;
                    let seq = record.append_line(stream_kind, line);
                    debug!(
                        job_id = %record.job_id,
                        ?stream_kind,
                        sequence_index = seq,
                        "Captured output line"
                    );
                }
                Ok(None) => {
                    let record = record.read().await;
                    debug!(job_id = %record.job_id, ?stream_kind, "End of stream");
                    break;
                }
                Err(e) => {
                    let record = record.read().await;
                    warn!(job_id = %record.job_id, ?stream_kind, "Stream read error: {}", e);
                    break;
                }
            }
        }
    })
}
