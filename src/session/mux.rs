use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{AbortHandle, JoinHandle};

/// Commands waiting to be written to the shell, one line each.
pub(crate) struct WriteQueue {
    tx: Option<UnboundedSender<String>>,
}

impl WriteQueue {
    pub(crate) fn send(&self, command: &str) -> Result<(), SessionError> {
        let tx = self.tx.as_ref().ok_or(SessionError::Closed)?;
        tx.send(command.to_string())
            .map_err(|_| SessionError::WriteError("shell writer task has stopped".to_string()))
    }

    /// Dropping the sender lets the writer task drain and exit.
    pub(crate) fn close(&mut self) {
        self.tx.take();
    }
}

/// Raw output chunks in arrival order.
pub(crate) struct ReadQueue {
    rx: UnboundedReceiver<String>,
}

impl ReadQueue {
    /// Next chunk if one is already buffered. A disconnected queue reads as
    /// empty.
    pub(crate) fn try_next(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn close(&mut self) {
        self.rx.close();
    }
}

/// The write and read queues of a shell plus handles of the tasks that
/// feed them.
pub(crate) struct Mux {
    pub(crate) writes: WriteQueue,
    pub(crate) reads: ReadQueue,
    tasks: Vec<AbortHandle>,
}

impl Mux {
    /// Splits `stream` and spawns the writer and reader tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub(crate) fn spawn<S>(stream: S, label: &str, health: Health, log: LogConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (command_tx, command_rx) = mpsc::unbounded_channel::<String>();
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(write_loop(
            writer,
            command_rx,
            label.to_string(),
            health.clone(),
            log,
        ));
        let reader_task = tokio::spawn(read_loop(
            reader,
            chunk_tx,
            label.to_string(),
            health.clone(),
            log,
        ));

        let tasks = vec![writer_task.abort_handle(), reader_task.abort_handle()];
        supervise("writer", label, writer_task, health.clone());
        supervise("reader", label, reader_task, health);

        Self {
            writes: WriteQueue {
                tx: Some(command_tx),
            },
            reads: ReadQueue { rx: chunk_rx },
            tasks,
        }
    }

    /// Closes both queues and stops the tasks. Safe to call repeatedly.
    pub(crate) fn shutdown(&mut self) {
        self.writes.close();
        self.reads.close();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Logs a panic in an I/O task instead of letting it vanish with the task.
fn supervise(role: &'static str, label: &str, task: JoinHandle<()>, health: Health) {
    let label = label.to_string();
    tokio::spawn(async move {
        if let Err(e) = task.await
            && e.is_panic()
        {
            error!("{} Shell {} task panicked: {}", label, role, e);
            health.degrade();
        }
    });
}

async fn write_loop<W>(
    mut writer: W,
    mut commands: UnboundedReceiver<String>,
    label: String,
    health: Health,
    log: LogConfig,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let line = format!("{command}\n");
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            error!("{} Failed to write to shell: {}", label, e);
            health.degrade();
            return;
        }
    }
    debug_if!(log, "{} Write queue closed, stopping writer.", label);
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(
    mut reader: R,
    chunks: UnboundedSender<String>,
    label: String,
    health: Health,
    log: LogConfig,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; config::READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug_if!(log, "{} Shell sent EOF.", label);
                health.degrade();
                return;
            }
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if log.debug {
                    trace!("{} {:?}", label, chunk);
                }
                if chunks.send(chunk).is_err() {
                    debug_if!(log, "{} Read queue closed, stopping reader.", label);
                    return;
                }
            }
            Err(e) => {
                error!("{} Failed to read from shell: {}", label, e);
                health.degrade();
                return;
            }
        }
    }
}
