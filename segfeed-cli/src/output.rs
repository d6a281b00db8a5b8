use std::path::Path;

use tokio::io::AsyncWrite;
use tracing::info;

use crate::error::Result;

pub type OutputWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// `-` selects stdout; anything else is created (or truncated) as a file.
pub async fn open_output(path: &Path) -> Result<OutputWriter> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(tokio::io::stdout()));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::File::create(path).await?;
    info!(path = %path.display(), "Writing stream to file");
    Ok(Box::new(file))
}
