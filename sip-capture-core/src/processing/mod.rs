pub mod history_parser;
