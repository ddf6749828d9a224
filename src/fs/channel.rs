//! Byte channels / 字节通道
//!
//! Object storage only knows whole-object GET and PUT. A read channel wraps the
//! streaming GET body. A write channel feeds a bounded queue that a worker task
//! turns into the body of one streaming PUT; the upload result becomes visible
//! on `close`.

use std::future::{poll_fn, Future};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::PollSender;

use super::path::ObjectPath;
use crate::error::{FsError, FsResult};
use crate::storage::{ObjectClient, ObjectStream};

/// Options accepted by `new_byte_channel` / 打开选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenOption {
    Read,
    Write,
    Create,
    CreateNew,
    TruncateExisting,
    /// Rejected: objects are always replaced whole / 不支持追加
    Append,
}

/// Forward-only reader over a streaming GET / 只读通道
pub struct ReadChannel {
    path: ObjectPath,
    body: ObjectStream,
    size: u64,
    position: u64,
    open: bool,
}

impl ReadChannel {
    pub(crate) fn new(path: ObjectPath, body: ObjectStream, size: u64) -> Self {
        Self {
            path,
            body,
            size,
            position: 0,
            open: true,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Read into `buf`, `Ok(0)` at end of object / 读取数据
    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        if !self.open {
            return Err(FsError::Closed("read channel"));
        }
        let n = self.body.read(buf).await?;
        self.position += n as u64;
        Ok(n)
    }

    /// Bytes delivered so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size known when the channel was opened, not re-validated / 打开时的大小
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn seek(&mut self, _position: u64) -> FsResult<()> {
        Err(FsError::Unsupported("seek"))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            self.body = Box::new(tokio::io::empty());
        }
    }
}

impl AsyncRead for ReadChannel {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.open {
            return Poll::Ready(Err(FsError::Closed("read channel").into()));
        }
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.body).poll_read(cx, buf))?;
        this.position += (buf.filled().len() - before) as u64;
        Poll::Ready(Ok(()))
    }
}

type FailureSlot = Arc<Mutex<Option<FsError>>>;

/// Incremental writer over a single streaming PUT / 上传通道
///
/// `write` waits while the queue is full. A failed upload is reported by the
/// next `write` and by every `close`. Dropping the channel without `close`
/// ends the stream and lets the upload finish in the background.
pub struct WriteChannel {
    path: ObjectPath,
    sender: PollSender<Bytes>,
    worker: Option<JoinHandle<()>>,
    failure: FailureSlot,
    written: u64,
    open: bool,
}

impl WriteChannel {
    /// Start the upload worker / 启动上传任务
    pub(crate) fn spawn(
        path: ObjectPath,
        client: Arc<dyn ObjectClient>,
        bucket: String,
        key: String,
        queue_depth: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Bytes>(queue_depth.max(1));
        let failure: FailureSlot = Arc::new(Mutex::new(None));

        let slot = failure.clone();
        let worker = tokio::spawn(async move {
            let chunks = ReceiverStream::new(rx).map(Ok::<_, io::Error>);
            let mut body: ObjectStream = Box::new(StreamReader::new(chunks));

            tracing::debug!("upload start: {}/{}", bucket, key);
            match client.put_object(&bucket, &key, &mut body).await {
                Ok(()) => tracing::debug!("upload done: {}/{}", bucket, key),
                Err(e) => {
                    tracing::debug!("upload failed: {}/{}: {}", bucket, key, e);
                    // record before the receiver goes away so writers see the cause
                    *slot.lock() = Some(e);
                }
            }
            drop(body);
        });

        Self {
            path,
            sender: PollSender::new(tx),
            worker: Some(worker),
            failure,
            written: 0,
            open: true,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Queue `data` for upload / 写入数据
    pub async fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        poll_fn(|cx| self.poll_write_bytes(cx, data)).await
    }

    /// End the stream and wait for the upload result / 结束上传并等待结果
    pub async fn close(&mut self) -> FsResult<()> {
        poll_fn(|cx| self.poll_close(cx)).await
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn failure(&self) -> Option<FsError> {
        self.failure.lock().clone()
    }

    /// Receiver gone: the worker has stopped reading / 上传任务已停止
    fn stream_failure(&self) -> FsError {
        self.failure()
            .unwrap_or_else(|| FsError::backend_msg(format!("upload of {} stopped early", self.path)))
    }

    fn poll_write_bytes(&mut self, cx: &mut Context<'_>, data: &[u8]) -> Poll<FsResult<usize>> {
        if !self.open {
            return Poll::Ready(Err(FsError::Closed("write channel")));
        }
        if let Some(e) = self.failure() {
            return Poll::Ready(Err(e));
        }
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }

        if ready!(self.sender.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(self.stream_failure()));
        }
        if self.sender.send_item(Bytes::copy_from_slice(data)).is_err() {
            return Poll::Ready(Err(self.stream_failure()));
        }
        self.written += data.len() as u64;
        Poll::Ready(Ok(data.len()))
    }

    fn poll_close(&mut self, cx: &mut Context<'_>) -> Poll<FsResult<()>> {
        if self.open {
            self.open = false;
            self.sender.close();
        }

        if let Some(worker) = self.worker.as_mut() {
            let joined = ready!(Pin::new(worker).poll(cx));
            self.worker = None;
            if let Err(e) = joined {
                self.failure.lock().get_or_insert(FsError::backend(e));
            }
        }

        Poll::Ready(match self.failure() {
            Some(e) => Err(e),
            None => Ok(()),
        })
    }
}

impl AsyncWrite for WriteChannel {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.get_mut().poll_write_bytes(cx, buf).map_err(io::Error::from)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_close(cx).map_err(io::Error::from)
    }
}

/// A channel open in exactly one direction / 字节通道
pub enum ByteChannel {
    Read(ReadChannel),
    Write(WriteChannel),
}

impl ByteChannel {
    pub fn path(&self) -> &ObjectPath {
        match self {
            ByteChannel::Read(c) => c.path(),
            ByteChannel::Write(c) => c.path(),
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        match self {
            ByteChannel::Read(c) => c.read(buf).await,
            ByteChannel::Write(_) => Err(FsError::Unsupported("read from a write channel")),
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> FsResult<usize> {
        match self {
            ByteChannel::Read(_) => Err(FsError::Unsupported("write to a read channel")),
            ByteChannel::Write(c) => c.write(data).await,
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            ByteChannel::Read(c) => c.position(),
            ByteChannel::Write(c) => c.bytes_written(),
        }
    }

    /// Read: size at open. Write: bytes written so far.
    pub fn size(&self) -> u64 {
        match self {
            ByteChannel::Read(c) => c.size(),
            ByteChannel::Write(c) => c.bytes_written(),
        }
    }

    pub fn seek(&mut self, _position: u64) -> FsResult<()> {
        Err(FsError::Unsupported("seek"))
    }

    pub fn truncate(&mut self, _size: u64) -> FsResult<()> {
        Err(FsError::Unsupported("truncate"))
    }

    pub fn is_open(&self) -> bool {
        match self {
            ByteChannel::Read(c) => c.is_open(),
            ByteChannel::Write(c) => c.is_open(),
        }
    }

    pub async fn close(&mut self) -> FsResult<()> {
        match self {
            ByteChannel::Read(c) => {
                c.close();
                Ok(())
            }
            ByteChannel::Write(c) => c.close().await,
        }
    }

    pub fn into_reader(self) -> FsResult<ReadChannel> {
        match self {
            ByteChannel::Read(c) => Ok(c),
            ByteChannel::Write(_) => Err(FsError::Unsupported("read from a write channel")),
        }
    }

    pub fn into_writer(self) -> FsResult<WriteChannel> {
        match self {
            ByteChannel::Read(_) => Err(FsError::Unsupported("write to a read channel")),
            ByteChannel::Write(c) => Ok(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::memory::{MemoryConnector, MemoryStore};
    use crate::storage::{BucketInfo, ClientConnector};
    use tokio::io::AsyncWriteExt;

    fn client(store: &Arc<MemoryStore>) -> Arc<dyn ObjectClient> {
        store.create_bucket("bucket-0");
        MemoryConnector::new(store.clone())
            .connect(&BucketInfo::new("bucket-0", "us-east-1"))
            .unwrap()
    }

    fn path(key: &str) -> ObjectPath {
        ObjectPath::parse(&format!("/bucket-0/{}", key))
    }

    #[tokio::test]
    async fn test_write_then_close_uploads() {
        let store = Arc::new(MemoryStore::new());
        let client = client(&store);

        let mut channel = WriteChannel::spawn(path("a.txt"), client, "bucket-0".into(), "a.txt".into(), 2);
        for chunk in ["hello", " ", "world", "!"] {
            assert_eq!(channel.write(chunk.as_bytes()).await.unwrap(), chunk.len());
        }
        assert_eq!(channel.write(b"").await.unwrap(), 0);
        channel.close().await.unwrap();

        assert!(!channel.is_open());
        assert_eq!(channel.bytes_written(), 12);
        assert_eq!(store.object("bucket-0", "a.txt").unwrap(), Bytes::from_static(b"hello world!"));

        // closing again is harmless, writing is not
        channel.close().await.unwrap();
        assert!(channel.write(b"late").await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_async_write_impl() {
        let store = Arc::new(MemoryStore::new());
        let client = client(&store);

        let mut channel = WriteChannel::spawn(path("big.bin"), client, "bucket-0".into(), "big.bin".into(), 1);
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        channel.write_all(&data).await.unwrap();
        channel.shutdown().await.unwrap();

        assert_eq!(store.object("bucket-0", "big.bin").unwrap().as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        let client = client(&store);
        store.fail_uploads("boom");

        let mut channel = WriteChannel::spawn(path("x"), client, "bucket-0".into(), "x".into(), 1);
        channel.write(b"chunk").await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while channel.failure().is_none() {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        // the next write reports the worker failure
        let err = channel.write(b"more").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(channel.bytes_written(), 5);

        let err = channel.close().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        // every close reports the same failure
        assert!(channel.close().await.unwrap_err().to_string().contains("boom"));
        assert_eq!(store.object_count("bucket-0"), 0);
    }

    #[tokio::test]
    async fn test_dropped_writer_still_uploads() {
        let store = Arc::new(MemoryStore::new());
        let client = client(&store);

        let mut channel = WriteChannel::spawn(path("d"), client, "bucket-0".into(), "d".into(), 4);
        channel.write(b"partial").await.unwrap();
        drop(channel);

        for _ in 0..100 {
            if store.object("bucket-0", "d").is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(store.object("bucket-0", "d").unwrap(), Bytes::from_static(b"partial"));
    }

    #[tokio::test]
    async fn test_read_channel() {
        let body: ObjectStream = Box::new(std::io::Cursor::new(b"0123456789".to_vec()));
        let mut channel = ReadChannel::new(path("r"), body, 10);

        let mut buf = [0u8; 4];
        assert_eq!(channel.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(channel.position(), 4);
        assert!(matches!(channel.seek(0), Err(FsError::Unsupported(_))));

        let mut rest = Vec::new();
        channel.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"456789");
        assert_eq!(channel.position(), 10);
        assert_eq!(channel.size(), 10);

        channel.close();
        assert!(channel.read(&mut buf).await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_byte_channel_direction() {
        let body: ObjectStream = Box::new(std::io::Cursor::new(Vec::new()));
        let mut channel = ByteChannel::Read(ReadChannel::new(path("r"), body, 0));
        assert!(matches!(channel.write(b"x").await, Err(FsError::Unsupported(_))));
        assert!(matches!(channel.truncate(0), Err(FsError::Unsupported(_))));
        channel.close().await.unwrap();
        assert!(!channel.is_open());
        assert!(channel.into_writer().is_err());
    }
}
