//! 文件溢出缓冲
//!
//! 追加日志 + 持久化消费游标，实例重启后积压通知仍可补发。
//!
//! 文件布局：
//! - `buffer.log`: 128 字节文件头（magic + 版本）+ 顺序条目
//! - `buffer.offset`: 8 字节消费游标 (LE u64)
//!
//! 条目格式：`[payload_len: u32][crc32: u32][enqueued_at: i64][payload]`，
//! CRC 覆盖 payload，读取时校验。打开时扫描并截掉写入中断留下的
//! 残尾；日志被完全消费后截断回文件头，防止无限增长。
//!
//! 单实例内 enqueue/dequeue 由同一把 Mutex 串行化；多实例共享
//! 部署应换用消息中间件背书的实现（同一抽象）。

use super::{OverflowBuffer, RETENTION};
use crate::notification::NotificationEvent;
use crate::{NotifyError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

const MAGIC: &[u8; 8] = b"ONOTBUF1";
const VERSION: u32 = 1;
const HEADER_SIZE: u64 = 128;
const ENTRY_HEADER_SIZE: u64 = 16;

/// 单条目载荷上限，超过视为文件损坏
const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

struct FileBufferInner {
    /// 追加写句柄
    writer: File,

    /// 随机读句柄
    reader: File,

    /// 游标文件句柄
    offset_file: File,

    /// 消费游标（日志内字节偏移）
    read_offset: u64,

    /// 日志当前长度
    file_len: u64,

    /// 未消费条目数
    pending: usize,
}

/// 文件溢出缓冲
pub struct FileOverflowBuffer {
    inner: Mutex<FileBufferInner>,
    retention: Duration,
}

impl FileOverflowBuffer {
    /// 打开（或创建）缓冲目录
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        Self::open_with_retention(base_path, RETENTION)
    }

    /// 自定义保留窗口（测试用）
    pub fn open_with_retention<P: AsRef<Path>>(base_path: P, retention: Duration) -> Result<Self> {
        let base = base_path.as_ref();
        std::fs::create_dir_all(base)
            .map_err(|e| NotifyError::IOError(format!("create {}: {}", base.display(), e)))?;

        let log_path = base.join("buffer.log");
        let offset_path = base.join("buffer.offset");

        let is_new = !log_path.exists();

        let mut writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| NotifyError::IOError(format!("open {}: {}", log_path.display(), e)))?;

        if is_new {
            let header = Self::encode_header();
            writer
                .write_all(&header)
                .and_then(|_| writer.sync_data())
                .map_err(|e| NotifyError::IOError(format!("write header: {}", e)))?;
        }

        let mut reader = File::open(&log_path)
            .map_err(|e| NotifyError::IOError(format!("open {}: {}", log_path.display(), e)))?;

        if !is_new {
            Self::validate_header(&mut reader)?;
        }

        let file_len = writer
            .metadata()
            .map_err(|e| NotifyError::IOError(e.to_string()))?
            .len();

        let mut offset_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&offset_path)
            .map_err(|e| NotifyError::IOError(format!("open {}: {}", offset_path.display(), e)))?;

        let read_offset = Self::load_offset(&mut offset_file)
            .unwrap_or(HEADER_SIZE)
            .clamp(HEADER_SIZE, file_len);

        // 扫描未消费条目，顺带探测写入中断留下的残尾
        let (pending, valid_len) = Self::scan_entries(&mut reader, read_offset, file_len)?;

        let file_len = if valid_len < file_len {
            log::warn!(
                "Overflow buffer log has a torn tail, truncating {} -> {} bytes",
                file_len,
                valid_len
            );
            writer
                .set_len(valid_len)
                .and_then(|_| writer.sync_data())
                .map_err(|e| NotifyError::IOError(format!("truncate torn tail: {}", e)))?;
            valid_len
        } else {
            file_len
        };

        if pending > 0 {
            log::info!(
                "Overflow buffer opened with {} pending entries ({})",
                pending,
                log_path.display()
            );
        }

        Ok(Self {
            inner: Mutex::new(FileBufferInner {
                writer,
                reader,
                offset_file,
                read_offset,
                file_len,
                pending,
            }),
            retention,
        })
    }

    fn encode_header() -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&VERSION.to_le_bytes());
        header.extend_from_slice(&chrono::Utc::now().timestamp().to_le_bytes());
        header.resize(HEADER_SIZE as usize, 0);
        header
    }

    fn validate_header(reader: &mut File) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE as usize];
        reader
            .seek(SeekFrom::Start(0))
            .and_then(|_| reader.read_exact(&mut header))
            .map_err(|e| NotifyError::BufferError(format!("read header: {}", e)))?;

        if &header[0..8] != MAGIC {
            return Err(NotifyError::BufferError("invalid buffer magic".to_string()));
        }

        let version = u32::from_le_bytes(header[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(NotifyError::BufferError(format!(
                "unsupported buffer version {}",
                version
            )));
        }

        Ok(())
    }

    fn load_offset(offset_file: &mut File) -> Option<u64> {
        let mut bytes = [0u8; 8];
        offset_file.seek(SeekFrom::Start(0)).ok()?;
        offset_file.read_exact(&mut bytes).ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    fn persist_offset(inner: &mut FileBufferInner) -> Result<()> {
        let offset_bytes = inner.read_offset.to_le_bytes();
        inner
            .offset_file
            .seek(SeekFrom::Start(0))
            .and_then(|_| inner.offset_file.write_all(&offset_bytes))
            .and_then(|_| inner.offset_file.sync_data())
            .map_err(|e| NotifyError::IOError(format!("persist offset: {}", e)))
    }

    /// 从游标扫到文件尾：返回 (完整条目数, 最后一个完整条目的结束偏移)
    fn scan_entries(reader: &mut File, start: u64, file_len: u64) -> Result<(usize, u64)> {
        let mut offset = start;
        let mut pending = 0usize;
        let mut entry_header = [0u8; ENTRY_HEADER_SIZE as usize];

        while offset + ENTRY_HEADER_SIZE <= file_len {
            reader
                .seek(SeekFrom::Start(offset))
                .and_then(|_| reader.read_exact(&mut entry_header))
                .map_err(|e| NotifyError::BufferError(format!("scan entries: {}", e)))?;

            let payload_len = u32::from_le_bytes(entry_header[0..4].try_into().unwrap());
            let entry_end = offset + ENTRY_HEADER_SIZE + payload_len as u64;

            if payload_len > MAX_PAYLOAD_SIZE || entry_end > file_len {
                // 残尾：从这里起不是完整条目
                return Ok((pending, offset));
            }

            offset = entry_end;
            pending += 1;
        }

        Ok((pending, offset))
    }

    /// 日志被完全消费后截断回文件头
    fn reset_if_consumed(inner: &mut FileBufferInner) -> Result<()> {
        if inner.read_offset < inner.file_len || inner.file_len == HEADER_SIZE {
            return Ok(());
        }

        inner
            .writer
            .set_len(HEADER_SIZE)
            .and_then(|_| inner.writer.sync_data())
            .map_err(|e| NotifyError::IOError(format!("truncate buffer log: {}", e)))?;

        inner.file_len = HEADER_SIZE;
        inner.read_offset = HEADER_SIZE;
        Self::persist_offset(inner)?;

        log::debug!("Overflow buffer log truncated after full consumption");
        Ok(())
    }
}

impl OverflowBuffer for FileOverflowBuffer {
    fn enqueue(&self, event: &NotificationEvent) -> Result<()> {
        let payload = event.to_bytes()?;
        let crc = crc32fast::hash(&payload);
        let enqueued_at = chrono::Utc::now().timestamp();

        let mut entry = Vec::with_capacity(ENTRY_HEADER_SIZE as usize + payload.len());
        entry.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        entry.extend_from_slice(&crc.to_le_bytes());
        entry.extend_from_slice(&enqueued_at.to_le_bytes());
        entry.extend_from_slice(&payload);

        let mut inner = self.inner.lock();
        inner
            .writer
            .write_all(&entry)
            .and_then(|_| inner.writer.sync_data())
            .map_err(|e| NotifyError::IOError(format!("append buffer entry: {}", e)))?;

        inner.file_len += entry.len() as u64;
        inner.pending += 1;

        Ok(())
    }

    fn dequeue_oldest(&self) -> Result<Option<NotificationEvent>> {
        let mut inner = self.inner.lock();

        loop {
            if inner.read_offset + ENTRY_HEADER_SIZE > inner.file_len {
                Self::reset_if_consumed(&mut inner)?;
                return Ok(None);
            }

            let read_offset = inner.read_offset;
            let mut entry_header = [0u8; ENTRY_HEADER_SIZE as usize];
            inner
                .reader
                .seek(SeekFrom::Start(read_offset))
                .and_then(|_| inner.reader.read_exact(&mut entry_header))
                .map_err(|e| NotifyError::BufferError(format!("read entry header: {}", e)))?;

            let payload_len = u32::from_le_bytes(entry_header[0..4].try_into().unwrap());
            let crc = u32::from_le_bytes(entry_header[4..8].try_into().unwrap());
            let enqueued_at = i64::from_le_bytes(entry_header[8..16].try_into().unwrap());

            if payload_len > MAX_PAYLOAD_SIZE || read_offset + ENTRY_HEADER_SIZE + payload_len as u64 > inner.file_len
            {
                // 长度字段损坏无从再对齐，跳过剩余内容避免永久阻塞队列
                log::error!(
                    "Corrupt entry length {} at offset {}, skipping rest of buffer log",
                    payload_len,
                    read_offset
                );
                inner.read_offset = inner.file_len;
                inner.pending = 0;
                Self::persist_offset(&mut inner)?;
                return Err(NotifyError::BufferError(format!(
                    "corrupt entry length at offset {}",
                    read_offset
                )));
            }

            let mut payload = vec![0u8; payload_len as usize];
            inner
                .reader
                .read_exact(&mut payload)
                .map_err(|e| NotifyError::BufferError(format!("read entry payload: {}", e)))?;

            // 条目无论好坏都推进游标，坏条目不得永久阻塞队列
            inner.read_offset = read_offset + ENTRY_HEADER_SIZE + payload_len as u64;
            inner.pending = inner.pending.saturating_sub(1);
            Self::persist_offset(&mut inner)?;

            if crc32fast::hash(&payload) != crc {
                return Err(NotifyError::BufferError(format!(
                    "CRC mismatch at offset {}",
                    read_offset
                )));
            }

            let now = chrono::Utc::now().timestamp();
            let age = Duration::from_secs(now.saturating_sub(enqueued_at).max(0) as u64);
            if age > self.retention {
                log::debug!(
                    "Discarding expired buffered notification (enqueued at {})",
                    enqueued_at
                );
                continue;
            }

            let event = NotificationEvent::from_bytes(&payload)?;
            Self::reset_if_consumed(&mut inner)?;
            return Ok(Some(event));
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().pending
    }
}
