//! netlink / generic netlink 메시지 프레이밍
//!
//! ```text
//! datagram ─▶ [nlmsghdr 16B][genlmsghdr 4B][attributes...] [nlmsghdr]...
//! ```
//!
//! 한 데이터그램에는 여러 메시지가 들어 있을 수 있으며, [`MessageIter`]가
//! `nlmsg_len`을 따라 분리합니다. 헤더 필드는 호스트 바이트 순서입니다.

use bytes::{BufMut, Bytes, BytesMut};

use crate::consts::{GENL_HDRLEN, NLMSG_DONE, NLMSG_ERROR, NLMSG_HDRLEN, nl_align};
use crate::error::DecodeError;

/// netlink 메시지 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetlinkHeader {
    /// 헤더 포함 전체 길이
    pub len: u32,
    /// 메시지 타입 (generic netlink에서는 패밀리 ID)
    pub msg_type: u16,
    /// NLM_F_* 플래그
    pub flags: u16,
    /// 시퀀스 번호
    pub seq: u32,
    /// 송신 포트 ID
    pub pid: u32,
}

impl NetlinkHeader {
    fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < NLMSG_HDRLEN {
            return Err(DecodeError::Truncated {
                what: "nlmsghdr",
                needed: NLMSG_HDRLEN,
                available: buf.len(),
            });
        }
        Ok(Self {
            len: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            msg_type: u16::from_ne_bytes([buf[4], buf[5]]),
            flags: u16::from_ne_bytes([buf[6], buf[7]]),
            seq: u32::from_ne_bytes([buf[8], buf[9], buf[10], buf[11]]),
            pid: u32::from_ne_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }
}

/// generic netlink 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenlHeader {
    /// 명령
    pub cmd: u8,
    /// 패밀리 버전
    pub version: u8,
}

/// 분리된 netlink 메시지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetlinkMessage<'a> {
    /// 에러 또는 ACK (`errno == 0`이면 ACK)
    Error {
        /// 원 요청의 시퀀스 번호
        seq: u32,
        /// 양수 errno
        errno: i32,
    },
    /// 멀티파트 종료
    Done {
        /// 시퀀스 번호
        seq: u32,
    },
    /// generic netlink 메시지
    Generic {
        /// netlink 헤더
        header: NetlinkHeader,
        /// genl 헤더
        genl: GenlHeader,
        /// 속성 스트림
        attrs: &'a [u8],
    },
}

/// 데이터그램 안의 메시지 반복자
///
/// 프레이밍 오류를 만나면 그 에러를 한 번 반환한 뒤 종료합니다.
#[derive(Debug, Clone)]
pub struct MessageIter<'a> {
    buf: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> MessageIter<'a> {
    /// 새 반복자를 생성합니다.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            failed: false,
        }
    }

    fn parse_one(&mut self) -> Result<NetlinkMessage<'a>, DecodeError> {
        let offset = self.offset;
        let rest = &self.buf[offset..];
        let header = NetlinkHeader::parse(rest)?;
        let len = header.len as usize;
        if len < NLMSG_HDRLEN || len > rest.len() {
            return Err(DecodeError::InvalidLength { offset, len });
        }
        self.offset = (offset + nl_align(len)).min(self.buf.len());

        let payload = &rest[NLMSG_HDRLEN..len];
        match header.msg_type {
            NLMSG_ERROR => {
                if payload.len() < 4 {
                    return Err(DecodeError::Truncated {
                        what: "nlmsgerr",
                        needed: 4,
                        available: payload.len(),
                    });
                }
                let error = i32::from_ne_bytes([payload[0], payload[1], payload[2], payload[3]]);
                // 에러 메시지에는 원 요청 헤더가 뒤따름. 없으면 외부 헤더의 seq 사용
                let seq = NetlinkHeader::parse(&payload[4..])
                    .map(|orig| orig.seq)
                    .unwrap_or(header.seq);
                Ok(NetlinkMessage::Error {
                    seq,
                    errno: error.saturating_neg(),
                })
            }
            NLMSG_DONE => Ok(NetlinkMessage::Done { seq: header.seq }),
            _ => {
                if payload.len() < GENL_HDRLEN {
                    return Err(DecodeError::Truncated {
                        what: "genlmsghdr",
                        needed: GENL_HDRLEN,
                        available: payload.len(),
                    });
                }
                Ok(NetlinkMessage::Generic {
                    header,
                    genl: GenlHeader {
                        cmd: payload[0],
                        version: payload[1],
                    },
                    attrs: &payload[GENL_HDRLEN..],
                })
            }
        }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<NetlinkMessage<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }
        let item = self.parse_one();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

/// generic netlink 메시지를 인코딩합니다.
pub fn encode_genl(
    msg_type: u16,
    flags: u16,
    seq: u32,
    genl: GenlHeader,
    attrs: &[u8],
) -> Bytes {
    let len = NLMSG_HDRLEN + GENL_HDRLEN + attrs.len();
    let mut buf = BytesMut::with_capacity(nl_align(len));
    buf.put_u32_ne(len as u32);
    buf.put_u16_ne(msg_type);
    buf.put_u16_ne(flags);
    buf.put_u32_ne(seq);
    buf.put_u32_ne(0); // pid: 커널이 채움
    buf.put_u8(genl.cmd);
    buf.put_u8(genl.version);
    buf.put_u16_ne(0);
    buf.put_slice(attrs);
    buf.put_bytes(0, nl_align(len) - len);
    buf.freeze()
}

/// `NLMSG_ERROR` 메시지를 인코딩합니다 (`errno == 0`이면 ACK).
///
/// 커널과 같은 형식으로 원 요청 헤더를 포함합니다.
pub fn encode_error(seq: u32, errno: i32, request: &NetlinkHeader) -> Bytes {
    let len = NLMSG_HDRLEN + 4 + NLMSG_HDRLEN;
    let mut buf = BytesMut::with_capacity(len);
    buf.put_u32_ne(len as u32);
    buf.put_u16_ne(NLMSG_ERROR);
    buf.put_u16_ne(0);
    buf.put_u32_ne(seq);
    buf.put_u32_ne(request.pid);
    buf.put_i32_ne(-errno);
    buf.put_u32_ne(request.len);
    buf.put_u16_ne(request.msg_type);
    buf.put_u16_ne(request.flags);
    buf.put_u32_ne(request.seq);
    buf.put_u32_ne(request.pid);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{AttributeDecoder, AttributeEncoder};
    use crate::consts::{NLM_F_ACK, NLM_F_REQUEST};

    fn genl(cmd: u8) -> GenlHeader {
        GenlHeader { cmd, version: 2 }
    }

    #[test]
    fn generic_message_roundtrip() {
        let attrs = AttributeEncoder::new().u32(9, 128).finish();
        let buf = encode_genl(0x1a, NLM_F_REQUEST | NLM_F_ACK, 7, genl(2), &attrs);
        assert_eq!(buf.len() % 4, 0);

        let msgs: Vec<_> = MessageIter::new(&buf).collect::<Result<_, _>>().unwrap();
        assert_eq!(msgs.len(), 1);
        match msgs[0] {
            NetlinkMessage::Generic {
                header,
                genl,
                attrs,
            } => {
                assert_eq!(header.msg_type, 0x1a);
                assert_eq!(header.seq, 7);
                assert_eq!(header.flags, NLM_F_REQUEST | NLM_F_ACK);
                assert_eq!(genl.cmd, 2);
                assert_eq!(genl.version, 2);
                let attr = AttributeDecoder::new(attrs).next().unwrap().unwrap();
                assert_eq!(attr.u32().unwrap(), 128);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn multiple_messages_in_one_datagram() {
        let first = encode_genl(0x1a, 0, 1, genl(5), &[]);
        let request = NetlinkHeader {
            len: 20,
            msg_type: 0x1a,
            flags: NLM_F_REQUEST,
            seq: 3,
            pid: 99,
        };
        let ack = encode_error(3, 0, &request);
        let mut datagram = first.to_vec();
        datagram.extend_from_slice(&ack);

        let msgs: Vec<_> = MessageIter::new(&datagram)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(matches!(msgs[1], NetlinkMessage::Error { seq: 3, errno: 0 }));
    }

    #[test]
    fn error_message_reports_positive_errno() {
        let request = NetlinkHeader {
            len: 20,
            msg_type: 0x10,
            flags: NLM_F_REQUEST,
            seq: 11,
            pid: 0,
        };
        let buf = encode_error(11, 2, &request);
        let msg = MessageIter::new(&buf).next().unwrap().unwrap();
        assert_eq!(msg, NetlinkMessage::Error { seq: 11, errno: 2 });
    }

    #[test]
    fn declared_length_past_buffer_is_error() {
        let mut buf = encode_genl(0x1a, 0, 1, genl(5), &[0; 8]).to_vec();
        buf[0..4].copy_from_slice(&200u32.to_ne_bytes());
        let mut iter = MessageIter::new(&buf);
        assert!(matches!(
            iter.next(),
            Some(Err(DecodeError::InvalidLength { offset: 0, len: 200 }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn short_datagram_is_truncated_header() {
        let mut iter = MessageIter::new(&[1, 2, 3]);
        assert!(matches!(
            iter.next(),
            Some(Err(DecodeError::Truncated { what: "nlmsghdr", .. }))
        ));
    }

    #[test]
    fn generic_without_genl_header_is_truncated() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&18u32.to_ne_bytes());
        buf.extend_from_slice(&0x1au16.to_ne_bytes());
        buf.extend_from_slice(&[0; 10]);
        buf.extend_from_slice(&[5, 1]);
        let err = MessageIter::new(&buf).next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                what: "genlmsghdr",
                ..
            }
        ));
    }
}
