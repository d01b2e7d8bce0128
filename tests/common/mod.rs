#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Transactions with a missing segment, an unparseable date and one missing age.
pub const TRANSACTIONS_CSV: &str = "\
transaction_date,amount,gender,age,segment
2023-01-05,100.0,F,25,Mass
2023-01-18,250.5,M,41,Affluent
2023-01-31,75.25,F,,Mass
2023-02-02,300.0,M,67,
2023-02-14,20.0,X,15,HNW
not a date,999.0,F,30,Mass
2023-03-01,60.0,F,33,Affluent
";

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}
