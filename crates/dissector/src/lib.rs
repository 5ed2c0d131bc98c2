#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`dissect`]: 계층 체인 디코딩 (`PacketDissector`, `dissect`)
//! - [`error`]: 구조적 디코딩 에러

pub mod dissect;
pub mod error;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// --- 주요 타입 re-export ---

pub use dissect::{Dissection, PacketDissector, dissect};
pub use error::{DissectError, Layer};
