//! ABOUTME: Template entity and Template Store - persists and semantically searches NL->operation templates

mod store;
mod template;
mod vocabulary;

pub use store::{embedding_text, TemplateStore};
pub use template::{
    ParameterLocation, ParameterSpec, ParameterType, ResultFormat, SemanticTags, Template, ValidationRules,
};
pub use vocabulary::DomainVocabulary;
