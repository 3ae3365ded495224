#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

/// Writes a small file dataset for organism 4:
/// genes 101..=108, a curated chain and a co-expression network
pub fn write_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("organisms.tsv"), "4\tTest organism\n").unwrap();

    let org = root.join("CORE").join("4");
    fs::create_dir_all(org.join("networks")).unwrap();
    fs::create_dir_all(org.join("attributes")).unwrap();
    let nodes: String = (101..=108).map(|id| format!("{id}\n")).collect();
    fs::write(org.join("nodes.txt"), nodes).unwrap();
    fs::write(
        org.join("networks.tsv"),
        "# id\tgroup\tname\tdefault\ttags\n\
         1\t1\tCurated pathways\t1\tBP,MF\n\
         2\t2\tCo-expression\t1\t-\n\
         3\t2\tShared domains\t0\n",
    )
    .unwrap();
    fs::write(
        org.join("networks").join("1.txt"),
        "101\t102\t1.0\n102\t103\t1.0\n103\t104\t1.0\n105\t106\t1.0\n",
    )
    .unwrap();
    fs::write(
        org.join("networks").join("2.txt"),
        "101\t103\t0.8\n102\t104\t0.6\n107\t108\t0.9\n",
    )
    .unwrap();
    fs::write(org.join("networks").join("3.txt"), "101\t105\n").unwrap();
    fs::write(org.join("attribute_groups.tsv"), "9\tProtein domains\n").unwrap();
    fs::write(
        org.join("attributes").join("9.txt"),
        "101\t1\n102\t1\n103\t1\n106\t2\n107\t2\n",
    )
    .unwrap();
    dir
}

pub fn write_query(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

pub fn netfuse() -> Command {
    Command::cargo_bin("netfuse").unwrap()
}
