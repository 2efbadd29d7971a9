//! 意图层：意图名到动作规格（shell 模板 / 插件）的静态映射

mod registry;

pub use registry::{ActionSpec, IntentRegistry};
