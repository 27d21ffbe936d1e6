mod xml;

pub use xml::parse_quest_document;
