//! 结构化输出模块：从生成式文本中恢复符合预期结构的 JSON。
//!
//! # Structured Output Recovery Module
//!
//! Generative backends are asked for JSON but routinely return it wrapped in
//! prose or markdown fences, with trailing commas, unquoted keys or cut off
//! mid-object. This module turns such replies into an object that always
//! satisfies the endpoint's [`ExpectedShape`], and reports how much repair
//! that took through [`RecoveryQuality`].
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ExpectedShape`] | Required-field schema with per-field placeholders |
//! | [`ResponseRecoverer`] | Parse, repair, then synthesize; never fails |
//! | [`RecoveredContent`] | Recovered object plus quality flag and filled fields |
//! | [`repair_json`] | Textual repairs applied outside string literals |
//!
//! # Examples
//!
//! ```
//! use ai_gateway::structured::{ExpectedShape, RecoveryQuality, ResponseRecoverer};
//!
//! let raw = "```json\n{\"title\": \"Fractions\", \"description\": \"Intro\",}\n```";
//! let out = ResponseRecoverer::new().recover(raw, &ExpectedShape::lesson());
//!
//! assert_eq!(out.value["title"], "Fractions");
//! assert_eq!(out.quality, RecoveryQuality::Repaired);
//! assert!(ExpectedShape::lesson().conforms(&out.value));
//! ```

mod recover;
mod repair;
mod shape;

pub use recover::{RecoveredContent, RecoveryQuality, ResponseRecoverer};
pub use repair::{extract_json_object, repair_json, strip_code_fences};
pub use shape::{ExpectedShape, FieldKind, FieldSpec};
