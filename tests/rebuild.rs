//! End-to-end rebuild tests: pack a directory to disk, read it back.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rezip::{
    CompressionMethod, LocalFileReader, PackError, PackOptions, PackWarning, PackageBuilder,
    ZipExtractor, verify_package,
};
use tempfile::TempDir;
use walkdir::WalkDir;

const MIMETYPE: &[u8] = b"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (name, data) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
}

fn xlsx_tree(root: &Path) {
    let sheet = "<row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c></row>".repeat(64);
    write_tree(
        root,
        &[
            ("mimetype", MIMETYPE),
            ("[Content_Types].xml", b"<?xml version=\"1.0\"?><Types/>"),
            ("_rels/.rels", b"<Relationships/>"),
            ("xl/workbook.xml", b"<workbook><sheets/></workbook>"),
            ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
            ("xl/media/image1.png", &[0x89, b'P', b'N', b'G', 0, 1, 2, 3]),
        ],
    );
}

async fn open(archive: &Path) -> ZipExtractor<LocalFileReader> {
    ZipExtractor::new(Arc::new(LocalFileReader::new(archive).unwrap()))
}

#[tokio::test]
async fn mimetype_and_three_files() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("book");
    write_tree(
        &src,
        &[
            ("mimetype", MIMETYPE),
            ("a.xml", &[b'a'; 100]),
            ("b/b.xml", &[b'b'; 2000]),
            ("b/c/c.bin", &[7u8; 35]),
        ],
    );
    let output = scratch.path().join("book.xlsx");

    rezip::build(&src, &output).unwrap();

    let extractor = open(&output).await;
    let entries = extractor.list_files().await.unwrap();
    assert_eq!(entries.len(), 4);

    assert_eq!(entries[0].file_name, "mimetype");
    assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
    assert_eq!(entries[0].uncompressed_size, MIMETYPE.len() as u64);
    assert_eq!(entries[0].compressed_size, MIMETYPE.len() as u64);
    assert_eq!(extractor.extract_to_memory(&entries[0]).await.unwrap(), MIMETYPE);

    let rest: Vec<_> = entries[1..]
        .iter()
        .map(|e| (e.file_name.as_str(), e.compression_method, e.uncompressed_size))
        .collect();
    assert_eq!(
        rest,
        [
            ("a.xml", CompressionMethod::Deflate, 100),
            ("b/b.xml", CompressionMethod::Deflate, 2000),
            ("b/c/c.bin", CompressionMethod::Deflate, 35),
        ]
    );
}

#[tokio::test]
async fn extraction_reproduces_the_tree() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    xlsx_tree(&src);
    let output = scratch.path().join("out.xlsx");

    let report = rezip::build(&src, &output).unwrap();
    assert!(report.warnings.is_empty());

    let extractor = open(&output).await;
    let entries = extractor.list_files().await.unwrap();
    assert!(entries.iter().all(|e| !e.is_directory));

    let unpacked = scratch.path().join("unpacked");
    for entry in &entries {
        extractor.extract_into(entry, &unpacked).await.unwrap();
    }

    let files = |root: &Path| -> Vec<(String, Vec<u8>)> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap();
                (rel.to_string_lossy().replace('\\', "/"), fs::read(e.path()).unwrap())
            })
            .collect()
    };
    assert_eq!(files(&src), files(&unpacked));
}

#[tokio::test]
async fn rebuilt_package_verifies() {
    let scratch = TempDir::new().unwrap();
    xlsx_tree(scratch.path());
    let output = scratch.path().join("rebuilt.xlsx");

    rezip::build(scratch.path(), &output).unwrap();

    let check = verify_package(Arc::new(LocalFileReader::new(&output).unwrap()))
        .await
        .unwrap();
    assert!(check.has_mimetype);
    assert!(check.has_content_types);
    assert_eq!(check.entries.len(), 6);
}

#[tokio::test]
async fn no_mimetype_still_builds() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    write_tree(
        &src,
        &[("[Content_Types].xml", b"<Types/>"), ("word/document.xml", b"<document/>")],
    );
    let output = scratch.path().join("doc.docx");

    let report = rezip::build(&src, &output).unwrap();
    assert_eq!(report.warnings, [PackWarning::MissingMimetype]);

    let entries = open(&output).await.list_files().await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, ["[Content_Types].xml", "word/document.xml"]);
}

#[test]
fn missing_source_creates_no_output() {
    let scratch = TempDir::new().unwrap();
    let output = scratch.path().join("out.xlsx");

    let err = rezip::build(scratch.path().join("nope"), &output).unwrap_err();
    assert!(matches!(err, PackError::NotFound(_)));
    assert!(err.to_string().contains("not found"));
    assert!(!output.exists());
}

#[test]
fn file_source_is_not_a_directory() {
    let scratch = TempDir::new().unwrap();
    let file = scratch.path().join("book.xlsx");
    fs::write(&file, b"PK").unwrap();

    let err = rezip::build(&file, scratch.path().join("out.xlsx")).unwrap_err();
    assert!(matches!(err, PackError::NotADirectory(_)));
}

#[test]
fn existing_output_is_truncated() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    write_tree(&src, &[("[Content_Types].xml", b"<Types/>")]);
    let output = scratch.path().join("out.xlsx");
    fs::write(&output, vec![0xAA; 64 * 1024]).unwrap();

    rezip::build(&src, &output).unwrap();
    assert!(fs::metadata(&output).unwrap().len() < 1024);
}

#[cfg(unix)]
#[test]
fn dangling_symlink_aborts_with_its_path() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    write_tree(&src, &[("[Content_Types].xml", b"<Types/>"), ("a.xml", b"<a/>")]);
    std::os::unix::fs::symlink(src.join("gone.xml"), src.join("b.xml")).unwrap();

    let err = rezip::build(&src, scratch.path().join("out.xlsx")).unwrap_err();
    match err {
        PackError::Io { context, path, .. } => {
            assert_eq!(context, "resolve symbolic link");
            assert!(path.ends_with("b.xml"));
        }
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn atomic_build_keeps_previous_output_when_a_link_dangles() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    write_tree(&src, &[("[Content_Types].xml", b"<Types/>"), ("a.xml", b"<a/>")]);
    std::os::unix::fs::symlink(src.join("gone.xml"), src.join("b.xml")).unwrap();
    let output = scratch.path().join("out.xlsx");
    fs::write(&output, b"previous").unwrap();

    let builder = PackageBuilder::new(PackOptions {
        atomic: true,
        ..PackOptions::default()
    });
    assert!(builder.build(&src, &output).is_err());
    assert_eq!(fs::read(&output).unwrap(), b"previous");

    let leftovers = fs::read_dir(scratch.path()).unwrap().count();
    assert_eq!(leftovers, 2, "temporary file was not cleaned up");
}

#[cfg(unix)]
#[test]
fn unreadable_file_aborts_with_its_path() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    write_tree(&src, &[("[Content_Types].xml", b"<Types/>"), ("xl/secret.xml", b"<x/>")]);
    let secret = src.join("xl/secret.xml");
    fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&secret).is_ok() {
        // Running as root: permissions are not enforced.
        return;
    }

    let err = rezip::build(&src, scratch.path().join("out.xlsx")).unwrap_err();
    match err {
        PackError::Io { path, .. } => assert!(path.ends_with("xl/secret.xml")),
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn atomic_build_keeps_previous_output_on_failure() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    write_tree(&src, &[("[Content_Types].xml", b"<Types/>"), ("locked.xml", b"<x/>")]);
    let output = scratch.path().join("out.xlsx");
    fs::write(&output, b"previous").unwrap();

    let locked = src.join("locked.xml");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        return;
    }

    let builder = PackageBuilder::new(PackOptions {
        atomic: true,
        ..PackOptions::default()
    });
    assert!(builder.build(&src, &output).is_err());
    assert_eq!(fs::read(&output).unwrap(), b"previous");

    let leftovers = fs::read_dir(scratch.path()).unwrap().count();
    assert_eq!(leftovers, 2, "temporary file was not cleaned up");
}

#[tokio::test]
async fn atomic_build_replaces_output() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("src");
    xlsx_tree(&src);
    let output = scratch.path().join("out.xlsx");
    fs::write(&output, b"previous").unwrap();

    let builder = PackageBuilder::new(PackOptions {
        atomic: true,
        ..PackOptions::default()
    });
    builder.build(&src, &output).unwrap();

    let entries = open(&output).await.list_files().await.unwrap();
    assert_eq!(entries[0].file_name, "mimetype");
}
