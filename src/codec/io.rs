//! Асинхронные адаптеры поверх tokio.
//!
//! Ядро кодека ничего не знает о приостановке: чтение подаёт чанки в
//! [`Deserializer`](super::Deserializer), запись забирает их из
//! [`Serializer`](super::Serializer) и ждёт готовности writer'а.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use zgraph_error::{ResultExt, ZgraphResult};

use super::{
    api::{Codec, READ_BUFFER_SIZE},
    encode::DEFAULT_CHUNK_SIZE,
    options::{DeserializeOptions, SerializeOptions},
};
use crate::value::{Document, Graph, Value};

impl Codec {
    /// Читает сообщение из асинхронного источника до EOF.
    pub async fn read_from_async<R>(
        &self,
        mut reader: R,
    ) -> ZgraphResult<Document>
    where
        R: AsyncRead + Unpin,
    {
        let mut session = self.deserializable()?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf).await.context("read_from_async")?;
            if n == 0 {
                break;
            }
            session.feed(&buf[..n]).context("read_from_async")?;
        }
        session.finish().context("read_from_async")
    }

    /// Записывает граф в асинхронный приёмник чанками по `chunk_size`
    /// байт. Возвращает кол-во записанных байт.
    pub async fn write_to_async<W>(
        &self,
        graph: &Graph,
        root: &Value,
        mut writer: W,
        chunk_size: usize,
    ) -> ZgraphResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut serializer = self.serializable(graph, root)?;
        while let Some(chunk) = serializer.next_chunk(chunk_size) {
            writer.write_all(&chunk).await.context("write_to_async")?;
        }
        writer.flush().await.context("write_to_async")?;
        let written = serializer.bytes_produced();
        debug!(bytes = written, "async write finished");
        Ok(written)
    }
}

pub async fn read_from_async<R>(
    reader: R,
    options: &DeserializeOptions,
) -> ZgraphResult<Document>
where
    R: AsyncRead + Unpin,
{
    Codec::new()
        .with_deserialize_options(*options)
        .read_from_async(reader)
        .await
}

pub async fn write_to_async<W>(
    graph: &Graph,
    root: &Value,
    writer: W,
    options: &SerializeOptions,
) -> ZgraphResult<u64>
where
    W: AsyncWrite + Unpin,
{
    Codec::new()
        .with_serialize_options(*options)
        .write_to_async(graph, root, writer, DEFAULT_CHUNK_SIZE)
        .await
}
