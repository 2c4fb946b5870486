//! Blocking codec for [`Data`] and frame headers, used by the engine loop (C2).
//!
//! Mirrors the shape of `hdbconnect_impl::protocol::request`/`reply`'s `sync_emit`/
//! `parse_sync` pair, but the payload here is the much smaller recursive `Data` carrier
//! rather than a HANA segment.

use crate::{tags, Data, ObjectId, WireError, WireResult, DEFAULT_MAX_STRING_LEN};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Cap on a single `Data::List`'s declared length, applied on decode.
pub const DEFAULT_MAX_LIST_LEN: u64 = 16 * 1024 * 1024;

pub fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_u64::<BigEndian>(v)
}

pub fn write_u8(w: &mut impl Write, v: u8) -> io::Result<()> {
    w.write_u8(v)
}

pub fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    r.read_u64::<BigEndian>()
}

pub fn read_u8(r: &mut impl Read) -> io::Result<u8> {
    r.read_u8()
}

pub fn write_string(w: &mut impl Write, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    #[allow(clippy::cast_possible_truncation)]
    w.write_u32::<BigEndian>(bytes.len() as u32)?;
    w.write_all(bytes)
}

/// Reads a `u32 length || bytes` string, discarding the declared length from the
/// stream (without allocating it) and erroring if it exceeds `max_len`.
pub fn read_string(r: &mut impl Read, max_len: u32) -> WireResult<String> {
    let len = r.read_u32::<BigEndian>()?;
    if len > max_len {
        io::copy(&mut r.take(u64::from(len)), &mut io::sink())?;
        return Err(WireError::StringTooLong {
            declared: len,
            max: max_len,
        });
    }
    let mut buf = vec![0_u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn write_data(w: &mut impl Write, data: &Data) -> io::Result<()> {
    match data {
        Data::Int(v) => {
            w.write_u8(tags::DATA_INT)?;
            w.write_i64::<BigEndian>(*v)
        }
        Data::String(s) => {
            w.write_u8(tags::DATA_STRING)?;
            write_string(w, s)
        }
        Data::List(items) => {
            w.write_u8(tags::DATA_LIST)?;
            #[allow(clippy::cast_possible_truncation)]
            w.write_u64::<BigEndian>(items.len() as u64)?;
            for item in items {
                write_data(w, item)?;
            }
            Ok(())
        }
        Data::Object(id) => {
            w.write_u8(tags::DATA_OBJECT)?;
            w.write_u64::<BigEndian>(id.value())
        }
    }
}

pub fn read_data(r: &mut impl Read, max_str_len: u32, max_list_len: u64) -> WireResult<Data> {
    let tag = r.read_u8()?;
    match tag {
        tags::DATA_INT => Ok(Data::Int(r.read_i64::<BigEndian>()?)),
        tags::DATA_STRING => Ok(Data::String(read_string(r, max_str_len)?)),
        tags::DATA_LIST => {
            let len = r.read_u64::<BigEndian>()?;
            if len > max_list_len {
                return Err(WireError::ListTooLong {
                    declared: len,
                    max: max_list_len,
                });
            }
            let mut items = Vec::with_capacity(len.min(1024) as usize);
            for _ in 0..len {
                items.push(read_data(r, max_str_len, max_list_len)?);
            }
            Ok(Data::List(items))
        }
        tags::DATA_OBJECT => Ok(Data::Object(ObjectId::new(r.read_u64::<BigEndian>()?))),
        other => Err(WireError::UnknownDataTag(other)),
    }
}

/// `read_data` with the crate's default string/list length caps.
pub fn read_data_default(r: &mut impl Read) -> WireResult<Data> {
    read_data(r, DEFAULT_MAX_STRING_LEN, DEFAULT_MAX_LIST_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &Data) -> Data {
        let mut buf = Vec::new();
        write_data(&mut buf, data).unwrap();
        let mut cursor = io::Cursor::new(buf);
        read_data_default(&mut cursor).unwrap()
    }

    #[test]
    fn roundtrips_primitives() {
        assert_eq!(roundtrip(&Data::Int(-42)), Data::Int(-42));
        assert_eq!(
            roundtrip(&Data::String("hi".into())),
            Data::String("hi".into())
        );
        assert_eq!(roundtrip(&Data::Object(ObjectId::new(7))), Data::Object(ObjectId::new(7)));
    }

    #[test]
    fn roundtrips_nested_list() {
        let data = Data::List(vec![
            Data::Int(1),
            Data::List(vec![Data::String("x".into()), Data::Object(ObjectId::new(3))]),
        ]);
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let mut cursor = io::Cursor::new(vec![0x09_u8]);
        assert!(matches!(
            read_data_default(&mut cursor),
            Err(WireError::UnknownDataTag(0x09))
        ));
    }

    #[test]
    fn oversized_string_is_recoverable() {
        let mut buf = Vec::new();
        write_data(&mut buf, &Data::String("hello".into())).unwrap();
        let mut cursor = io::Cursor::new(buf);
        let err = read_data(&mut cursor, 2, DEFAULT_MAX_LIST_LEN).unwrap_err();
        assert!(matches!(err, WireError::StringTooLong { .. }));
    }
}
