//! Remote gzip files read through HTTP Range requests.
//!
//! Listing needs the trailer at the very end and the header at the front.
//! The reader opens with a suffix range (`bytes=-8`): the `206` reply carries
//! the trailer and, in its `Content-Range`, the total size, so no `HEAD`
//! round trip is needed. The header window is then the only other request.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use crate::gzip::structures::TRAILER_SIZE;
use anyhow::{Context, Result, anyhow, bail};

/// Span reported by a `Content-Range: bytes start-end/total` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    /// Inclusive
    end: u64,
    total: u64,
}

impl ContentRange {
    fn parse(value: &str) -> Option<Self> {
        let (span, total) = value.trim().strip_prefix("bytes ")?.split_once('/')?;
        let (start, end) = span.split_once('-')?;
        let range = Self {
            start: start.trim().parse().ok()?,
            end: end.trim().parse().ok()?,
            total: total.trim().parse().ok()?,
        };
        (range.start <= range.end && range.end < range.total).then_some(range)
    }

    fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// HTTP Range reader for remote gzip files
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    /// Offset of the first cached tail byte
    tail_start: u64,
    tail: Vec<u8>,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Open `url`, fetching its trailer up front.
    pub async fn new(url: String) -> Result<Self> {
        Self::with_tail(url, TRAILER_SIZE as u64).await
    }

    /// Open `url`, caching its last `tail_len` bytes.
    ///
    /// Fails unless the server answers the suffix range with `206 Partial Content`.
    pub async fn with_tail(url: String, tail_len: u64) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let mut reader = Self {
            client,
            url,
            size: 0,
            tail_start: 0,
            tail: Vec::new(),
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        };

        let (range, tail) = reader.fetch(&format!("bytes=-{}", tail_len.max(1))).await?;
        if range.end + 1 != range.total {
            bail!("{} answered a suffix range with {:?}", reader.url, range);
        }
        debug!(
            "{}: {} bytes, cached {} tail bytes",
            reader.url,
            range.total,
            tail.len()
        );
        reader.size = range.total;
        reader.tail_start = range.start;
        reader.tail = tail;
        Ok(reader)
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// GET a single range, retrying timeouts and refused connections.
    async fn fetch(&self, range: &str) -> Result<(ContentRange, Vec<u8>)> {
        let mut attempt = 0;
        let resp = loop {
            match self.client.get(&self.url).header(RANGE, range).send().await {
                Ok(resp) => break resp,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt + 1 < self.max_retry => {
                    attempt += 1;
                    warn!(
                        "{}: {} failed, retry {}/{}: {}",
                        self.url, range, attempt, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e).with_context(|| format!("GET {} ({})", self.url, range)),
            }
        };

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            bail!(
                "{} answered {} to a Range request; the server must support Range requests",
                self.url,
                resp.status()
            );
        }
        let content_range = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentRange::parse)
            .ok_or_else(|| anyhow!("{} sent no usable Content-Range", self.url))?;

        let body = resp.bytes().await?;
        if body.len() as u64 != content_range.len() {
            bail!(
                "{}: Content-Range {:?} does not match a {} byte body",
                self.url,
                content_range,
                body.len()
            );
        }
        self.transferred_bytes
            .fetch_add(body.len() as u64, Ordering::Relaxed);
        Ok((content_range, body.to_vec()))
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.size - offset) as usize;

        if offset >= self.tail_start {
            let start = (offset - self.tail_start) as usize;
            buf[..want].copy_from_slice(&self.tail[start..start + want]);
            return Ok(want);
        }

        let last = offset + want as u64 - 1;
        let mut filled = 0;
        while filled < want {
            let from = offset + filled as u64;
            let (range, body) = self.fetch(&format!("bytes={}-{}", from, last)).await?;
            if range.start != from {
                bail!("{} returned bytes from {} instead of {}", self.url, range.start, from);
            }
            let n = body.len().min(want - filled);
            buf[filled..filled + n].copy_from_slice(&body[..n]);
            filled += n;
        }
        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GzInspector, GzWriter, Header};
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `data` like a static file server that honours Range requests.
    ///
    /// Every response closes its connection, so the hit counter equals the
    /// number of requests.
    async fn serve(data: Vec<u8>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/file.gz", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                }
                let request = String::from_utf8_lossy(&request).to_lowercase();
                let wanted = request
                    .lines()
                    .find_map(|l| l.strip_prefix("range: bytes="))
                    .map(|r| r.trim().to_string())
                    .unwrap_or_default();

                let len = data.len();
                let (start, end) = match wanted.split_once('-') {
                    Some(("", suffix)) => (len.saturating_sub(suffix.parse().unwrap()), len - 1),
                    Some((from, "")) => (from.parse().unwrap(), len - 1),
                    Some((from, to)) => {
                        let to: usize = to.parse().unwrap();
                        (from.parse().unwrap(), to.min(len - 1))
                    }
                    None => (0, len - 1),
                };
                let body = &data[start..=end];
                let head = format!(
                    "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n",
                    start,
                    end,
                    len,
                    body.len()
                );
                stream.write_all(head.as_bytes()).await.unwrap();
                stream.write_all(body).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });
        (url, hits)
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(
            ContentRange::parse("bytes 92-99/100"),
            Some(ContentRange {
                start: 92,
                end: 99,
                total: 100
            })
        );
        assert_eq!(ContentRange::parse("bytes 0-0/1").map(|r| r.len()), Some(1));
        assert_eq!(ContentRange::parse("bytes */100"), None);
        assert_eq!(ContentRange::parse("bytes 5-4/100"), None);
        assert_eq!(ContentRange::parse("bytes 0-100/100"), None);
    }

    #[tokio::test]
    async fn trailer_comes_from_the_opening_request() {
        let data: Vec<u8> = (0..100u8).collect();
        let (url, hits) = serve(data.clone()).await;

        let reader = HttpRangeReader::new(url).await.unwrap();
        assert_eq!(reader.size(), 100);
        assert_eq!(reader.transferred_bytes(), 8);

        let mut trailer = [0u8; 8];
        assert_eq!(reader.read_at(92, &mut trailer).await.unwrap(), 8);
        assert_eq!(&trailer[..], &data[92..]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let mut head = [0u8; 10];
        assert_eq!(reader.read_at(3, &mut head).await.unwrap(), 10);
        assert_eq!(&head[..], &data[3..13]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // Clipped at the end of the object
        let mut over = [0u8; 16];
        assert_eq!(reader.read_at(90, &mut over).await.unwrap(), 10);
        assert_eq!(reader.read_at(100, &mut over).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lists_a_remote_gzip_file_in_two_requests() {
        let mut w = GzWriter::with_header(
            Vec::new(),
            Header::new().with_name("remote.txt"),
            Default::default(),
        );
        w.write_all(&b"remote payload ".repeat(50)).unwrap();
        let bytes = w.finish().unwrap();
        let (url, hits) = serve(bytes.clone()).await;

        let reader = Arc::new(HttpRangeReader::new(url).await.unwrap());
        let entry = GzInspector::new(reader.clone()).inspect().await.unwrap();
        assert_eq!(entry.header.name(), Some("remote.txt"));
        assert_eq!(entry.uncompressed_size, 750);
        assert_eq!(entry.header_len + entry.compressed_size + 8, bytes.len() as u64);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
