//! netlink 속성(TLV) 디코더/인코더
//!
//! ```text
//! ┌──────────┬──────────┬───────────────────┬─────────┐
//! │ nla_len  │ nla_type │ value             │ padding │
//! │ u16      │ u16      │ nla_len - 4 bytes │ to 4    │
//! └──────────┴──────────┴───────────────────┴─────────┘
//! ```
//!
//! 헤더 필드는 호스트 바이트 순서입니다. `nla_type`의 상위 두 비트는
//! 플래그(`NLA_F_NESTED`, `NLA_F_NET_BYTEORDER`)이며 [`Attribute::kind`]에서 제거됩니다.
//!
//! [`AttributeDecoder`]는 지연 반복자입니다. 구조 오류를 만나면 그 에러를
//! 한 번 반환한 뒤 종료하며, 버퍼 밖을 읽지 않습니다.

use bytes::{BufMut, Bytes, BytesMut};

use crate::consts::nl_align;

/// 속성 헤더 길이
pub const NLA_HDRLEN: usize = 4;
/// 중첩 속성 플래그
pub const NLA_F_NESTED: u16 = 1 << 15;
/// 네트워크 바이트 순서 플래그
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
/// 속성 타입 마스크
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);
/// 속성 값 최대 길이 (`nla_len`은 u16)
pub const MAX_ATTR_VALUE: usize = u16::MAX as usize - NLA_HDRLEN;

/// 속성 디코딩 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    /// 남은 바이트가 속성 헤더보다 짧음
    #[error("attribute header truncated at offset {offset}: {available} bytes left")]
    TruncatedHeader { offset: usize, available: usize },

    /// nla_len이 헤더 길이보다 작음
    #[error("attribute length {len} at offset {offset} is shorter than its header")]
    LengthTooShort { offset: usize, len: usize },

    /// nla_len이 버퍼 끝을 넘어섬
    #[error("attribute length {len} at offset {offset} overruns {total}-byte buffer")]
    Overrun {
        offset: usize,
        len: usize,
        total: usize,
    },

    /// 고정 길이 값의 크기가 맞지 않음
    #[error("attribute {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: u16,
        expected: usize,
        actual: usize,
    },
}

/// 디코딩된 속성 하나
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    raw_type: u16,
    value: &'a [u8],
}

impl<'a> Attribute<'a> {
    /// 플래그를 제거한 속성 타입
    pub fn kind(&self) -> u16 {
        self.raw_type & NLA_TYPE_MASK
    }

    /// 중첩 속성 플래그 여부
    pub fn is_nested(&self) -> bool {
        self.raw_type & NLA_F_NESTED != 0
    }

    /// 값이 네트워크 바이트 순서인지 여부
    pub fn is_net_byteorder(&self) -> bool {
        self.raw_type & NLA_F_NET_BYTEORDER != 0
    }

    /// 원시 값 (패딩 제외)
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    fn fixed<const N: usize>(&self) -> Result<[u8; N], AttrError> {
        self.value.try_into().map_err(|_| AttrError::InvalidLength {
            kind: self.kind(),
            expected: N,
            actual: self.value.len(),
        })
    }

    pub fn u8(&self) -> Result<u8, AttrError> {
        self.fixed::<1>().map(|b| b[0])
    }

    pub fn u16(&self) -> Result<u16, AttrError> {
        let raw = self.fixed::<2>()?;
        Ok(if self.is_net_byteorder() {
            u16::from_be_bytes(raw)
        } else {
            u16::from_ne_bytes(raw)
        })
    }

    pub fn u32(&self) -> Result<u32, AttrError> {
        let raw = self.fixed::<4>()?;
        Ok(if self.is_net_byteorder() {
            u32::from_be_bytes(raw)
        } else {
            u32::from_ne_bytes(raw)
        })
    }

    pub fn u64(&self) -> Result<u64, AttrError> {
        let raw = self.fixed::<8>()?;
        Ok(if self.is_net_byteorder() {
            u64::from_be_bytes(raw)
        } else {
            u64::from_ne_bytes(raw)
        })
    }

    /// NUL 종료 문자열. 끝의 NUL은 제거되고 잘못된 UTF-8은 치환됩니다.
    pub fn string(&self) -> String {
        let end = self
            .value
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        String::from_utf8_lossy(&self.value[..end]).into_owned()
    }

    /// 바이너리 값
    pub fn bytes(&self) -> &'a [u8] {
        self.value
    }

    /// 중첩 속성 디코더
    pub fn nested(&self) -> AttributeDecoder<'a> {
        AttributeDecoder::new(self.value)
    }
}

/// 속성 스트림 디코더
///
/// 구조 오류 이후에는 `None`만 반환합니다.
#[derive(Debug, Clone)]
pub struct AttributeDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> AttributeDecoder<'a> {
    /// 새 디코더를 생성합니다.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    /// 지정한 타입의 첫 속성을 찾습니다. 그 앞의 구조 오류는 그대로 반환됩니다.
    pub fn find(self, kind: u16) -> Result<Option<Attribute<'a>>, AttrError> {
        for attr in self {
            let attr = attr?;
            if attr.kind() == kind {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }
}

impl<'a> Iterator for AttributeDecoder<'a> {
    type Item = Result<Attribute<'a>, AttrError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        let offset = self.offset;
        let rest = &self.buf[offset..];
        if rest.len() < NLA_HDRLEN {
            self.failed = true;
            return Some(Err(AttrError::TruncatedHeader {
                offset,
                available: rest.len(),
            }));
        }

        let len = usize::from(u16::from_ne_bytes([rest[0], rest[1]]));
        let raw_type = u16::from_ne_bytes([rest[2], rest[3]]);

        if len < NLA_HDRLEN {
            self.failed = true;
            return Some(Err(AttrError::LengthTooShort { offset, len }));
        }
        if len > rest.len() {
            self.failed = true;
            return Some(Err(AttrError::Overrun {
                offset,
                len,
                total: self.buf.len(),
            }));
        }

        // 마지막 속성은 패딩이 없을 수 있음
        self.offset = (offset + nl_align(len)).min(self.buf.len());

        Some(Ok(Attribute {
            raw_type,
            value: &rest[NLA_HDRLEN..len],
        }))
    }
}

/// 속성 스트림 인코더
///
/// 요청 메시지와 테스트 픽스처 생성에 사용합니다. 값은 호스트 바이트 순서로 기록됩니다.
#[derive(Debug, Default)]
pub struct AttributeEncoder {
    buf: BytesMut,
}

impl AttributeEncoder {
    /// 새 인코더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&mut self, raw_type: u16, value: &[u8]) -> &mut Self {
        let value = if value.len() > MAX_ATTR_VALUE {
            tracing::warn!(
                kind = raw_type & NLA_TYPE_MASK,
                len = value.len(),
                "attribute value too long, truncating"
            );
            &value[..MAX_ATTR_VALUE]
        } else {
            value
        };

        let len = NLA_HDRLEN + value.len();
        // MAX_ATTR_VALUE로 제한했으므로 u16에 들어감
        self.buf.put_u16_ne(len as u16);
        self.buf.put_u16_ne(raw_type);
        self.buf.put_slice(value);
        self.buf.put_bytes(0, nl_align(len) - len);
        self
    }

    pub fn u8(&mut self, kind: u16, value: u8) -> &mut Self {
        self.put(kind, &[value])
    }

    pub fn u16(&mut self, kind: u16, value: u16) -> &mut Self {
        self.put(kind, &value.to_ne_bytes())
    }

    pub fn u32(&mut self, kind: u16, value: u32) -> &mut Self {
        self.put(kind, &value.to_ne_bytes())
    }

    pub fn u64(&mut self, kind: u16, value: u64) -> &mut Self {
        self.put(kind, &value.to_ne_bytes())
    }

    /// 값 없는 플래그 속성
    pub fn flag(&mut self, kind: u16) -> &mut Self {
        self.put(kind, &[])
    }

    /// NUL 종료 문자열
    pub fn string(&mut self, kind: u16, value: &str) -> &mut Self {
        let mut raw = Vec::with_capacity(value.len() + 1);
        raw.extend_from_slice(value.as_bytes());
        raw.push(0);
        self.put(kind, &raw)
    }

    pub fn bytes(&mut self, kind: u16, value: &[u8]) -> &mut Self {
        self.put(kind, value)
    }

    /// 중첩 속성. 클로저 안에서 내부 속성을 기록합니다.
    pub fn nested(&mut self, kind: u16, build: impl FnOnce(&mut AttributeEncoder)) -> &mut Self {
        let mut inner = AttributeEncoder::new();
        build(&mut inner);
        let inner = inner.finish();
        self.put(kind | NLA_F_NESTED, &inner)
    }

    /// 지금까지 기록된 길이
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 기록된 바이트를 꺼냅니다. 인코더는 비워지고 재사용할 수 있습니다.
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}
