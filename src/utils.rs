//! Utility functions for output paths and directories

use crate::error::{Error, Result};
use crate::types::{ImageIndex, PostReference};
use std::path::{Path, PathBuf};

/// Suffix of a file that is still being written
pub const PARTIAL_SUFFIX: &str = ".part";

/// Directory that receives the images of one post: `{root}/{post id}`
pub fn post_output_dir(root: &Path, post: &PostReference) -> PathBuf {
    root.join(post.id())
}

/// File name for one image of a post
///
/// ```
/// use carousel_dl::types::ImageIndex;
/// use carousel_dl::utils::image_path;
/// use std::path::Path;
///
/// let path = image_path(Path::new("out/ABC"), ImageIndex::new(3).unwrap());
/// assert_eq!(path, Path::new("out/ABC/image_3.jpg"));
/// ```
pub fn image_path(dir: &Path, index: ImageIndex) -> PathBuf {
    dir.join(format!("image_{}.jpg", index))
}

/// Path used while a download is in flight (`image_1.jpg` → `image_1.jpg.part`)
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Create a directory and all of its parents; succeeds if it already exists
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| Error::OutputDir {
            path: path.to_path_buf(),
            source,
        })
}
