//! Async codec for [`Data`] and frame headers, used by the driver transport (C3).
//!
//! Mirrors the shape of `hdbconnect_impl::protocol::request`/`reply`'s `async_emit`/
//! `parse_async` pair. Recursion into nested `Data::List` needs an explicit heap-boxed
//! future (async fns cannot recurse directly), handled here via `async_recursion`.

use crate::{tags, Data, ObjectId, WireError, WireResult, DEFAULT_MAX_STRING_LEN};
use async_recursion::async_recursion;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Cap on a single `Data::List`'s declared length, applied on decode.
pub const DEFAULT_MAX_LIST_LEN: u64 = 16 * 1024 * 1024;

pub async fn write_string<W: AsyncWrite + Unpin + Send>(w: &mut W, s: &str) -> std::io::Result<()> {
    let bytes = s.as_bytes();
    #[allow(clippy::cast_possible_truncation)]
    w.write_u32(bytes.len() as u32).await?;
    w.write_all(bytes).await
}

/// Reads a `u32 length || bytes` string, discarding the declared length from the
/// stream in bounded chunks (without allocating it) and erroring if it exceeds
/// `max_len`.
pub async fn read_string<R: AsyncRead + Unpin + Send>(r: &mut R, max_len: u32) -> WireResult<String> {
    let len = r.read_u32().await?;
    if len > max_len {
        let mut remaining = u64::from(len);
        let mut scratch = [0_u8; 4096];
        while remaining > 0 {
            let chunk = remaining.min(scratch.len() as u64) as usize;
            r.read_exact(&mut scratch[..chunk]).await?;
            remaining -= chunk as u64;
        }
        return Err(WireError::StringTooLong {
            declared: len,
            max: max_len,
        });
    }
    let mut buf = vec![0_u8; len as usize];
    r.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[async_recursion]
pub async fn write_data<W: AsyncWrite + Unpin + Send>(w: &mut W, data: &Data) -> std::io::Result<()> {
    match data {
        Data::Int(v) => {
            w.write_u8(tags::DATA_INT).await?;
            w.write_i64(*v).await
        }
        Data::String(s) => {
            w.write_u8(tags::DATA_STRING).await?;
            write_string(w, s).await
        }
        Data::List(items) => {
            w.write_u8(tags::DATA_LIST).await?;
            #[allow(clippy::cast_possible_truncation)]
            w.write_u64(items.len() as u64).await?;
            for item in items {
                write_data(w, item).await?;
            }
            Ok(())
        }
        Data::Object(id) => {
            w.write_u8(tags::DATA_OBJECT).await?;
            w.write_u64(id.value()).await
        }
    }
}

#[async_recursion]
pub async fn read_data<R: AsyncRead + Unpin + Send>(
    r: &mut R,
    max_str_len: u32,
    max_list_len: u64,
) -> WireResult<Data> {
    let tag = r.read_u8().await?;
    match tag {
        tags::DATA_INT => Ok(Data::Int(r.read_i64().await?)),
        tags::DATA_STRING => Ok(Data::String(read_string(r, max_str_len).await?)),
        tags::DATA_LIST => {
            let len = r.read_u64().await?;
            if len > max_list_len {
                return Err(WireError::ListTooLong {
                    declared: len,
                    max: max_list_len,
                });
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_data(r, max_str_len, max_list_len).await?);
            }
            Ok(Data::List(items))
        }
        tags::DATA_OBJECT => Ok(Data::Object(ObjectId::new(r.read_u64().await?))),
        other => Err(WireError::UnknownDataTag(other)),
    }
}

/// `read_data` with the crate's default string/list length caps.
pub async fn read_data_default<R: AsyncRead + Unpin + Send>(r: &mut R) -> WireResult<Data> {
    read_data(r, DEFAULT_MAX_STRING_LEN, DEFAULT_MAX_LIST_LEN).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip(data: &Data) -> Data {
        let mut buf = Vec::new();
        write_data(&mut buf, data).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        read_data_default(&mut cursor).await.unwrap()
    }

    #[tokio::test]
    async fn roundtrips_nested_list() {
        let data = Data::List(vec![
            Data::Int(1),
            Data::List(vec![Data::String("x".into()), Data::Object(ObjectId::new(3))]),
        ]);
        assert_eq!(roundtrip(&data).await, data);
    }

    #[tokio::test]
    async fn unknown_tag_is_an_error() {
        let mut cursor = std::io::Cursor::new(vec![0x09_u8]);
        let err = read_data_default(&mut cursor).await.unwrap_err();
        assert!(matches!(err, WireError::UnknownDataTag(0x09)));
    }
}
