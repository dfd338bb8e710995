//! SeaORM entity models
//!
//! Database entities for ExamFlow

mod paper;

pub use paper::{
    Entity as PaperEntity,
    Model as PaperRow,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};
