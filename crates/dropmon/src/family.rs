//! generic netlink 컨트롤러 -- 패밀리 조회
//!
//! `CTRL_CMD_GETFAMILY` 요청으로 이름("NET_DM")에 해당하는 패밀리 ID,
//! 버전, 멀티캐스트 그룹 목록을 얻습니다.

use bytes::Bytes;

use crate::attr::{AttributeDecoder, AttributeEncoder};
use crate::consts::{
    CTRL_ATTR_FAMILY_ID, CTRL_ATTR_FAMILY_NAME, CTRL_ATTR_MCAST_GROUPS, CTRL_ATTR_MCAST_GRP_ID,
    CTRL_ATTR_MCAST_GRP_NAME, CTRL_ATTR_VERSION, CTRL_CMD_GETFAMILY, CTRL_VERSION, GENL_ID_CTRL,
    NLM_F_ACK, NLM_F_REQUEST,
};
use crate::error::DecodeError;
use crate::message::{GenlHeader, encode_genl};

/// 멀티캐스트 그룹
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McastGroup {
    /// 그룹 이름
    pub name: String,
    /// 그룹 ID
    pub id: u32,
}

/// 조회된 패밀리 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyInfo {
    /// 패밀리 이름
    pub name: String,
    /// 패밀리 ID (메시지 타입으로 사용)
    pub id: u16,
    /// 패밀리 버전 (genl 헤더에 사용)
    pub version: u8,
    /// 멀티캐스트 그룹
    pub groups: Vec<McastGroup>,
}

impl FamilyInfo {
    /// 이름으로 멀티캐스트 그룹 ID를 찾습니다.
    pub fn group_id(&self, name: &str) -> Option<u32> {
        self.groups.iter().find(|g| g.name == name).map(|g| g.id)
    }
}

/// `CTRL_CMD_GETFAMILY` 요청을 인코딩합니다.
pub fn encode_get_family(name: &str, seq: u32) -> Bytes {
    let mut attrs = AttributeEncoder::new();
    attrs.string(CTRL_ATTR_FAMILY_NAME, name);
    encode_genl(
        GENL_ID_CTRL,
        NLM_F_REQUEST | NLM_F_ACK,
        seq,
        GenlHeader {
            cmd: CTRL_CMD_GETFAMILY,
            version: CTRL_VERSION,
        },
        &attrs.finish(),
    )
}

/// 컨트롤러 응답의 속성 스트림을 파싱합니다.
pub fn parse_family(attrs: &[u8]) -> Result<FamilyInfo, DecodeError> {
    let mut id = None;
    let mut name = None;
    let mut version = 1u8;
    let mut groups = Vec::new();

    for attr in AttributeDecoder::new(attrs) {
        let attr = attr?;
        match attr.kind() {
            CTRL_ATTR_FAMILY_ID => id = Some(attr.u16()?),
            CTRL_ATTR_FAMILY_NAME => name = Some(attr.string()),
            // 커널은 u32로 보내지만 genl 헤더 버전은 u8
            CTRL_ATTR_VERSION => version = u8::try_from(attr.u32()?).unwrap_or(u8::MAX),
            CTRL_ATTR_MCAST_GROUPS => {
                for entry in attr.nested() {
                    let entry = entry?;
                    let mut group_name = None;
                    let mut group_id = None;
                    for field in entry.nested() {
                        let field = field?;
                        match field.kind() {
                            CTRL_ATTR_MCAST_GRP_NAME => group_name = Some(field.string()),
                            CTRL_ATTR_MCAST_GRP_ID => group_id = Some(field.u32()?),
                            _ => {}
                        }
                    }
                    if let (Some(name), Some(id)) = (group_name, group_id) {
                        groups.push(McastGroup { name, id });
                    }
                }
            }
            _ => {}
        }
    }

    Ok(FamilyInfo {
        name: name.ok_or(DecodeError::MissingAttribute("CTRL_ATTR_FAMILY_NAME"))?,
        id: id.ok_or(DecodeError::MissingAttribute("CTRL_ATTR_FAMILY_ID"))?,
        version,
        groups,
    })
}

/// 컨트롤러 응답 속성을 인코딩합니다 (테스트/모의 커널용).
pub fn encode_family_attrs(info: &FamilyInfo) -> Bytes {
    let mut attrs = AttributeEncoder::new();
    attrs
        .string(CTRL_ATTR_FAMILY_NAME, &info.name)
        .u16(CTRL_ATTR_FAMILY_ID, info.id)
        .u32(CTRL_ATTR_VERSION, u32::from(info.version));
    if !info.groups.is_empty() {
        attrs.nested(CTRL_ATTR_MCAST_GROUPS, |list| {
            for (index, group) in info.groups.iter().enumerate() {
                let index = u16::try_from(index + 1).unwrap_or(u16::MAX);
                list.nested(index, |entry| {
                    entry
                        .string(CTRL_ATTR_MCAST_GRP_NAME, &group.name)
                        .u32(CTRL_ATTR_MCAST_GRP_ID, group.id);
                });
            }
        });
    }
    attrs.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{NET_DM_FAMILY_NAME, NET_DM_GRP_NAME};
    use crate::message::{MessageIter, NetlinkMessage};

    fn net_dm() -> FamilyInfo {
        FamilyInfo {
            name: NET_DM_FAMILY_NAME.to_owned(),
            id: 0x1c,
            version: 2,
            groups: vec![McastGroup {
                name: NET_DM_GRP_NAME.to_owned(),
                id: 1,
            }],
        }
    }

    #[test]
    fn get_family_request_layout() {
        let buf = encode_get_family(NET_DM_FAMILY_NAME, 42);
        let msg = MessageIter::new(&buf).next().unwrap().unwrap();
        let NetlinkMessage::Generic {
            header,
            genl,
            attrs,
        } = msg
        else {
            panic!("expected generic message");
        };
        assert_eq!(header.msg_type, GENL_ID_CTRL);
        assert_eq!(header.seq, 42);
        assert_eq!(genl.cmd, CTRL_CMD_GETFAMILY);
        let name = AttributeDecoder::new(attrs)
            .find(CTRL_ATTR_FAMILY_NAME)
            .unwrap()
            .unwrap();
        assert_eq!(name.string(), "NET_DM");
    }

    #[test]
    fn parse_family_reads_groups() {
        let attrs = encode_family_attrs(&net_dm());
        let info = parse_family(&attrs).unwrap();
        assert_eq!(info, net_dm());
        assert_eq!(info.group_id("events"), Some(1));
        assert_eq!(info.group_id("other"), None);
    }

    #[test]
    fn parse_family_requires_id() {
        let attrs = AttributeEncoder::new()
            .string(CTRL_ATTR_FAMILY_NAME, "NET_DM")
            .finish();
        assert_eq!(
            parse_family(&attrs).unwrap_err(),
            DecodeError::MissingAttribute("CTRL_ATTR_FAMILY_ID")
        );
    }
}
