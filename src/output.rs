// output formatting - readable text or raw json

use crate::core::{Completion, SmartAnswer};

pub struct Output;

impl Output {
    // for humans
    pub fn pretty(answer: &SmartAnswer, show_sql: bool) {
        if show_sql {
            match &answer.sql_query {
                Some(sql) => println!("sql: {sql}\nrows: {}\n", answer.records_found),
                None => println!("sql: (none, answered directly)\n"),
            }
        }

        println!("{}", answer.message.trim());
    }

    pub fn chat(completion: &Completion) {
        println!("{}", completion.text.trim());
    }

    // for scripts
    pub fn raw(answer: &SmartAnswer) {
        println!("{}", serde_json::to_string(answer).unwrap_or_default());
    }
}
