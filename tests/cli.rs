//! End-to-end tests that exercise the compiled binary directly: file/stdin
//! handling, transparent decompression, `--toc`, and stderr-only stats.
//! Style and `binary_path()` helper adapted from the glob-pattern
//! integration tests of the dump-filter tool this crate reimplements.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use tempfile::TempDir;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // test binary
    path.pop(); // deps
    path.push("mysqldump-filter");
    path
}

fn simple_dump() -> &'static str {
    "-- MySQL dump 10.13  Distrib 5.1.42\n\
     --\n\
     -- Host: localhost    Database: shop\n\
     -- ------------------------------------------------------\n\
     -- Server version       5.1.42\n\
     \n\
     /*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;\n\
     /*!40103 SET @OLD_TIME_ZONE=@@TIME_ZONE */;\n\
     \n\
     --\n\
     -- Current Database: `shop`\n\
     --\n\
     \n\
     CREATE DATABASE /*!32312 IF NOT EXISTS*/ `shop` /*!40100 DEFAULT CHARACTER SET latin1 */;\n\
     \n\
     USE `shop`;\n\
     \n\
     --\n\
     -- Table structure for table `widgets`\n\
     --\n\
     \n\
     DROP TABLE IF EXISTS `widgets`;\n\
     CREATE TABLE `widgets` (\n\
     \x20 `id` int NOT NULL\n\
     ) ENGINE=InnoDB DEFAULT CHARSET=utf8;\n\
     \n\
     --\n\
     -- Dumping data for table `widgets`\n\
     --\n\
     \n\
     LOCK TABLES `widgets` WRITE;\n\
     INSERT INTO `widgets` VALUES (1);\n\
     UNLOCK TABLES;\n\
     \n\
     -- Dump completed on 2024-01-01  0:00:00\n"
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::File::create(&path).unwrap().write_all(content.as_bytes()).unwrap();
    path
}

fn write_gz(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let file = fs::File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, GzCompression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

#[test]
fn plain_file_is_passed_through_unfiltered() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "dump.sql", simple_dump());

    let output = Command::new(binary_path()).arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, simple_dump());
}

#[test]
fn gzip_input_is_transparently_decompressed() {
    let dir = TempDir::new().unwrap();
    let path = write_gz(dir.path(), "dump.sql.gz", simple_dump());

    let output = Command::new(binary_path()).arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("INSERT INTO `widgets` VALUES (1);"));
}

#[test]
fn toc_mode_prints_node_table_without_sql_content() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "dump.sql", simple_dump());

    let output = Command::new(binary_path()).arg("--toc").arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("dump-header"));
    assert!(stdout.contains("table-ddl"));
    assert!(stdout.contains("`shop`.`widgets` (ddl)"));
    assert!(!stdout.contains("INSERT INTO"));
}

#[test]
fn verbose_reports_stats_on_stderr_not_stdout() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "dump.sql", simple_dump());

    let output = Command::new(binary_path())
        .arg("--verbose")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stdout, simple_dump());
    assert!(stderr.contains("node counts"));
    assert!(!stdout.contains("node counts"));
}

#[test]
fn no_data_drops_row_data_across_the_real_binary() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "dump.sql", simple_dump());

    let output = Command::new(binary_path()).arg("--no-data").arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("INSERT INTO"));
    assert!(stdout.contains("CREATE TABLE `widgets`"));
}

#[test]
fn exclude_database_drops_everything_for_that_database() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "dump.sql", simple_dump());

    let output = Command::new(binary_path())
        .arg("--exclude-database")
        .arg("shop")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("CREATE TABLE `widgets`"));
    assert!(!stdout.contains("INSERT INTO"));
    // Header and setup-session aren't database-ddl nodes, so they survive.
    assert!(stdout.contains("MySQL dump 10.13"));
}
