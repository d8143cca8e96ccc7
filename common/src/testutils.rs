use anyhow::Context;
use async_recursion::async_recursion;
use std::os::unix::fs::MetadataExt;

#[derive(Copy, Clone, Debug)]
pub enum FileEqualityCheck {
    /// compare file type and contents
    Basic,
    /// also compare mode bits and modification time
    Attributes,
}

/// Size of the n-th file of the test tree.
pub const fn file_size(index: u64) -> u64 {
    index * 1500 + 37
}

pub const TEST_TREE_SIZE: u64 =
    file_size(0) + file_size(1) + file_size(2) + file_size(3) + file_size(4) + file_size(5);

pub fn file_contents(index: u64) -> Vec<u8> {
    (0..file_size(index))
        .map(|i| ((i * 31 + index * 7) % 251) as u8)
        .collect()
}

async fn create_temp_dir() -> anyhow::Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("prsync_test{}", &idx));
        if let Err(error) = tokio::fs::create_dir(&tmp_dir).await {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

pub async fn setup_test_dir() -> anyhow::Result<std::path::PathBuf> {
    // create a temporary directory
    let tmp_dir = create_temp_dir().await?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- qux
    //       |- 5.txt
    let foo_path = tmp_dir.join("foo");
    tokio::fs::create_dir(&foo_path).await?;
    tokio::fs::write(foo_path.join("0.txt"), file_contents(0)).await?;
    let bar_path = foo_path.join("bar");
    tokio::fs::create_dir(&bar_path).await?;
    for index in 1..=3 {
        tokio::fs::write(bar_path.join(format!("{index}.txt")), file_contents(index)).await?;
    }
    let baz_path = foo_path.join("baz");
    tokio::fs::create_dir(&baz_path).await?;
    tokio::fs::write(baz_path.join("4.txt"), file_contents(4)).await?;
    let qux_path = baz_path.join("qux");
    tokio::fs::create_dir(&qux_path).await?;
    tokio::fs::write(qux_path.join("5.txt"), file_contents(5)).await?;
    Ok(tmp_dir)
}

#[async_recursion]
pub async fn check_dirs_identical(
    src: &std::path::Path,
    dst: &std::path::Path,
    check: FileEqualityCheck,
) -> anyhow::Result<()> {
    let mut src_entries = tokio::fs::read_dir(src).await?;
    let mut src_count = 0;
    while let Some(src_entry) = src_entries.next_entry().await? {
        src_count += 1;
        let src_entry_path = src_entry.path();
        let src_entry_name = src_entry_path.file_name().context("entry without a name")?;
        let dst_entry_path = dst.join(src_entry_name);
        let src_md = tokio::fs::metadata(&src_entry_path)
            .await
            .with_context(|| format!("Source file {:?} is missing!", &src_entry_path))?;
        let dst_md = tokio::fs::metadata(&dst_entry_path)
            .await
            .with_context(|| format!("Destination file {:?} is missing!", &dst_entry_path))?;
        assert_eq!(src_md.is_file(), dst_md.is_file(), "{:?}", &dst_entry_path);
        if src_md.is_file() {
            let src_contents = tokio::fs::read(&src_entry_path).await?;
            let dst_contents = tokio::fs::read(&dst_entry_path).await?;
            assert_eq!(src_contents, dst_contents, "{:?}", &dst_entry_path);
            if let FileEqualityCheck::Attributes = check {
                assert_eq!(src_md.mode(), dst_md.mode(), "{:?}", &dst_entry_path);
                assert_eq!(src_md.mtime(), dst_md.mtime(), "{:?}", &dst_entry_path);
                assert_eq!(src_md.mtime_nsec(), dst_md.mtime_nsec(), "{:?}", &dst_entry_path);
            }
        } else {
            check_dirs_identical(&src_entry_path, &dst_entry_path, check).await?;
        }
    }
    let mut dst_entries = tokio::fs::read_dir(dst).await?;
    let mut dst_count = 0;
    while dst_entries.next_entry().await?.is_some() {
        dst_count += 1;
    }
    assert_eq!(src_count, dst_count, "{:?} has extra entries", dst);
    Ok(())
}
