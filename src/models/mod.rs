pub mod question;
pub mod unit;

pub use question::{
    Category, ChoiceOption, CodeAnalysisCase, ContentType, ExternalResources, FibAnswer, Question,
    QuestionExtra, QuestionType, RearrangeStep,
};
pub use unit::UnitContext;
