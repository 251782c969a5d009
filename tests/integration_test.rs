use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::str;
use tempfile::NamedTempFile;

#[test]
fn insert_and_retrieve_row() {
    let output = run(&[
        "insert 1 user1 person1@example.com",
        "select",
        ".exit",
    ]);

    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            "db > (1, user1, person1@example.com)".to_string(),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn keeps_rows_sorted_by_id_regardless_of_insert_order() {
    let output = run(&[
        "insert 3 carol carol@example.com",
        "insert 1 alice alice@example.com",
        "insert 2 bob bob@example.com",
        "select",
        ".exit",
    ]);

    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            "db > Executed.".to_string(),
            "db > Executed.".to_string(),
            "db > (1, alice, alice@example.com)".to_string(),
            "(2, bob, bob@example.com)".to_string(),
            "(3, carol, carol@example.com)".to_string(),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn rejects_duplicate_key() {
    let output = run(&[
        "insert 1 alice alice@example.com",
        "insert 1 alice2 alice2@example.com",
        "select",
        ".exit",
    ]);

    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            "db > Error: Duplicate Key.".to_string(),
            "db > (1, alice, alice@example.com)".to_string(),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn allows_maximum_length_strings() {
    let username = "a".repeat(32);
    let email = "a".repeat(255);
    let output = run(&[&format!("insert 1 {username} {email}"), "select", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            format!("db > ({}, {}, {})", 1, username, email),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn rejects_strings_that_are_too_long() {
    let username = "a".repeat(33);
    let output = run(&[&format!("insert 1 {username} person@example.com"), ".exit"]);

    assert_eq!(
        output,
        vec!["db > String is too long.".to_string(), "db > ".to_string()]
    );
}

#[test]
fn allows_zero_id() {
    let output = run(&["insert 0 alice alice@example.com", "select", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > Executed.".to_string(),
            "db > (0, alice, alice@example.com)".to_string(),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn rejects_negative_ids() {
    let output = run(&["insert -5 alice alice@example.com", ".exit"]);

    assert_eq!(
        output,
        vec!["db > ID must be positive.".to_string(), "db > ".to_string()]
    );
}

#[test]
fn survives_a_leaf_split_and_keeps_every_row_reachable() {
    let mut input: Vec<String> = (1..=20)
        .map(|i| format!("insert {i} user{i} person{i}@example.com"))
        .collect();
    input.push("select".to_string());
    input.push(".exit".to_string());

    let input_refs: Vec<&str> = input.iter().map(String::as_str).collect();
    let output = run(&input_refs);

    let selected: Vec<&String> = output
        .iter()
        .filter(|line| line.starts_with("db > (") || line.starts_with('('))
        .collect();
    assert_eq!(selected.len(), 20);
    for (i, line) in selected.iter().enumerate() {
        let id = i + 1;
        assert!(
            line.contains(&format!("({id}, user{id}, person{id}@example.com)")),
            "row {id} missing or out of order: {line}"
        );
    }
}

#[test]
fn data_persists_across_reopen() {
    let tmp = NamedTempFile::new().unwrap();
    run_against(tmp.path(), &["insert 1 alice alice@example.com", ".exit"]);
    let output = run_against(tmp.path(), &["select", ".exit"]);

    assert_eq!(
        output,
        vec![
            "db > (1, alice, alice@example.com)".to_string(),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

fn run(lines: &[&str]) -> Vec<String> {
    let tmp = NamedTempFile::new().unwrap();
    run_against(tmp.path(), lines)
}

fn run_against(db_path: &std::path::Path, lines: &[&str]) -> Vec<String> {
    let mut process = marbledb_exe()
        .arg(db_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("unable to start marbledb");

    let stdin = process.stdin.as_mut().expect("unable to pipe stdin");
    for line in lines {
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .unwrap_or_else(|_| panic!("unable to write command `{line}`"));
    }

    let output = process
        .wait_with_output()
        .expect("unable to get process output");

    str::from_utf8(&output.stdout)
        .expect("process output was not utf8")
        .lines()
        .map(str::to_owned)
        .collect()
}

fn marbledb_exe() -> Command {
    let target_dir = env::current_exe()
        .ok()
        .map(|mut path| {
            path.pop();
            if path.ends_with("deps") {
                path.pop();
            }
            path
        })
        .expect("this should only be used where a `current_exe` can be set");
    let exe = target_dir.join(format!("marbledb{}", env::consts::EXE_SUFFIX));
    Command::new(exe)
}
