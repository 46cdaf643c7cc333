//! # 데이터 모델 모듈
//!
//! 저장소가 다루는 엔티티 구조체들입니다.
//! - `note`: 노트(Note). 항상 (id, owner_id) 쌍으로만 접근합니다.
//! - `user`: 사용자(User)
//! - `refresh_token`: Refresh 토큰과 회전 체인
//!
//! 각 엔티티는 저장된 행 전체(`Note`)와 생성 입력(`NewNote`) 두 가지 형태가 있습니다.

pub mod note;
pub mod refresh_token;
pub mod user;

pub use note::*;
pub use refresh_token::*;
pub use user::*;
