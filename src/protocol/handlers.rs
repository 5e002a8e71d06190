//! Call handlers for the storage node.
//!
//! Each handler validates its request, runs the matching [`FileStore`] operation and
//! turns the outcome into a reply or an [`RpcStatus`]. Missing required fields on the
//! mutating calls are soft failures: an `ok` reply whose message explains the
//! problem. Every other failure is a hard status.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::info;

use crate::protocol::messages::{
    Call, ContentEncoding, DeleteRequest, DirectoryRequest, DownloadReply, DownloadRequest,
    ListAllReply, ListReply, MoveRequest, RenameRequest, Reply, RpcStatus, StatusReply,
    SubdirectoryRequest, UploadFileRequest, UploadReply,
};
use crate::storage::{DeleteResult, FileStore};

/// Handler set bound to one storage root and node identity
#[derive(Debug, Clone)]
pub struct FileService {
    store: FileStore,
    node_id: String,
}

impl FileService {
    pub fn new(store: FileStore, node_id: impl Into<String>) -> Self {
        Self {
            store,
            node_id: node_id.into(),
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Dispatches a received call to its handler.
    pub fn handle(&self, call: Call) -> Result<Reply, RpcStatus> {
        match call {
            Call::UploadFile(req) => self.upload_file(req).map(Reply::Upload),
            Call::CreateDirectory(req) => self.create_directory(req).map(Reply::Status),
            Call::CreateSubdirectory(req) => self.create_subdirectory(req).map(Reply::Status),
            Call::DeleteFile(req) => self.delete_file(req).map(Reply::Status),
            Call::RenameFile(req) => self.rename_file(req).map(Reply::Status),
            Call::MoveFile(req) => self.move_file(req).map(Reply::Status),
            Call::ListFiles(req) => self.list_files(req).map(Reply::List),
            Call::ListDirectories(req) => self.list_directories(req).map(Reply::List),
            Call::ListAll(req) => self.list_all(req).map(Reply::ListAll),
            Call::DownloadFile(req) => self.download_file(req).map(Reply::Download),
        }
    }

    pub fn upload_file(&self, req: UploadFileRequest) -> Result<UploadReply, RpcStatus> {
        if req.filename.trim().is_empty() {
            return Ok(self.soft_upload_failure("Filename must not be empty"));
        }

        let content = decode_content(&req.content, req.encoding)?;
        let written = self
            .store
            .write(&req.filename, &content, req.directory.as_deref())?;

        info!(
            "Uploaded {} ({} bytes, {})",
            written.virtual_path, written.metadata.size_bytes, written.metadata.mime_type
        );

        Ok(UploadReply {
            message: "File uploaded successfully".into(),
            file_path: written.virtual_path,
            name: written.name,
            size: written.metadata.size_bytes,
            mime_type: written.metadata.mime_type,
            node_id: self.node_id.clone(),
        })
    }

    fn soft_upload_failure(&self, message: &str) -> UploadReply {
        UploadReply {
            message: message.into(),
            file_path: String::new(),
            name: String::new(),
            size: 0,
            mime_type: String::new(),
            node_id: self.node_id.clone(),
        }
    }

    pub fn create_directory(&self, req: DirectoryRequest) -> Result<StatusReply, RpcStatus> {
        if req.path.trim().is_empty() {
            return Ok(status("Directory path must not be empty"));
        }
        let created = self.store.create_directory(&req.path)?;
        Ok(status(format!(
            "Directory {} created successfully",
            created.virtual_path
        )))
    }

    pub fn create_subdirectory(&self, req: SubdirectoryRequest) -> Result<StatusReply, RpcStatus> {
        if req.parent_directory.trim().is_empty() || req.subdirectory_name.trim().is_empty() {
            return Ok(status(
                "Parent directory and subdirectory name must not be empty",
            ));
        }
        let created = self
            .store
            .create_subdirectory(&req.parent_directory, &req.subdirectory_name)?;
        Ok(status(format!(
            "Subdirectory {} created successfully",
            created.virtual_path
        )))
    }

    pub fn delete_file(&self, req: DeleteRequest) -> Result<StatusReply, RpcStatus> {
        if req.path.trim().is_empty() {
            return Ok(status("Path must not be empty"));
        }
        let message = match self.store.delete(&req.path)? {
            DeleteResult::FileRemoved => "File deleted successfully",
            DeleteResult::DirectoryRemoved => "Directory deleted successfully",
            DeleteResult::Missing => "File or directory does not exist",
        };
        Ok(status(message))
    }

    pub fn rename_file(&self, req: RenameRequest) -> Result<StatusReply, RpcStatus> {
        if req.old_name.trim().is_empty() || req.new_name.trim().is_empty() {
            return Err(RpcStatus::invalid_argument(
                "old_name and new_name are required",
            ));
        }
        let renamed = self.store.rename(&req.old_name, &req.new_name)?;
        Ok(status(format!(
            "Renamed {} to {}",
            renamed.from, renamed.to
        )))
    }

    pub fn move_file(&self, req: MoveRequest) -> Result<StatusReply, RpcStatus> {
        if req.source_path.trim().is_empty() || req.destination_path.trim().is_empty() {
            return Err(RpcStatus::invalid_argument(
                "source_path and destination_path are required",
            ));
        }
        let moved = self
            .store
            .move_entry(&req.source_path, &req.destination_path)?;
        Ok(status(format!("Moved {} to {}", moved.from, moved.to)))
    }

    pub fn list_files(&self, req: DirectoryRequest) -> Result<ListReply, RpcStatus> {
        let entries = self.store.list_files(&req.path)?;
        Ok(ListReply { entries })
    }

    pub fn list_directories(&self, req: DirectoryRequest) -> Result<ListReply, RpcStatus> {
        let entries = self.store.list_directories(&req.path)?;
        Ok(ListReply { entries })
    }

    pub fn list_all(&self, req: DirectoryRequest) -> Result<ListAllReply, RpcStatus> {
        let listing = self.store.list_all(&req.path)?;
        Ok(ListAllReply {
            files: listing.files,
            directories: listing.directories,
        })
    }

    pub fn download_file(&self, req: DownloadRequest) -> Result<DownloadReply, RpcStatus> {
        if req.path.trim().is_empty() {
            return Err(RpcStatus::invalid_argument("path is required"));
        }
        let read = self.store.read(&req.path)?;
        Ok(DownloadReply {
            content_base64: STANDARD.encode(&read.content),
            filename: read.name,
            size: read.metadata.size_bytes,
            mime_type: read.metadata.mime_type,
        })
    }
}

fn status(message: impl Into<String>) -> StatusReply {
    StatusReply {
        message: message.into(),
    }
}

fn decode_content(content: &str, encoding: ContentEncoding) -> Result<Vec<u8>, RpcStatus> {
    match encoding {
        ContentEncoding::Base64 => STANDARD
            .decode(content.trim())
            .map_err(|e| RpcStatus::invalid_argument(format!("Invalid base64 content: {}", e))),
        ContentEncoding::Text => Ok(content.as_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::StatusCode;
    use tempfile::TempDir;

    fn service() -> (TempDir, FileService) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("storage"), true).unwrap();
        (dir, FileService::new(store, "node-test"))
    }

    fn upload(name: &str, text: &str) -> UploadFileRequest {
        UploadFileRequest {
            filename: name.into(),
            content: STANDARD.encode(text),
            encoding: ContentEncoding::Base64,
            directory: None,
        }
    }

    #[test]
    fn empty_filename_is_a_soft_failure() {
        let (_dir, service) = service();
        let reply = service.upload_file(upload("", "x")).unwrap();
        assert_eq!(reply.message, "Filename must not be empty");
        assert!(reply.file_path.is_empty());
    }

    #[test]
    fn invalid_base64_is_invalid_argument() {
        let (_dir, service) = service();
        let mut req = upload("a.txt", "x");
        req.content = "***not base64***".into();
        let err = service.upload_file(req).unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }

    #[test]
    fn upload_reports_metadata_and_node() {
        let (_dir, service) = service();
        let mut req = upload("page.html", "<p>hi</p>");
        req.directory = Some("site".into());
        let reply = service.upload_file(req).unwrap();
        assert_eq!(reply.file_path, "site/page.html");
        assert_eq!(reply.name, "page.html");
        assert_eq!(reply.size, 9);
        assert_eq!(reply.mime_type, "text/html");
        assert_eq!(reply.node_id, "node-test");
    }

    #[test]
    fn text_encoding_is_stored_verbatim() {
        let (_dir, service) = service();
        let req = UploadFileRequest {
            filename: "plain.txt".into(),
            content: "raw text".into(),
            encoding: ContentEncoding::Text,
            directory: None,
        };
        service.upload_file(req).unwrap();
        let download = service
            .download_file(DownloadRequest { path: "plain.txt".into() })
            .unwrap();
        assert_eq!(STANDARD.decode(download.content_base64).unwrap(), b"raw text");
    }

    #[test]
    fn empty_directory_fields_are_soft_failures() {
        let (_dir, service) = service();
        let reply = service
            .create_directory(DirectoryRequest { path: " ".into() })
            .unwrap();
        assert_eq!(reply.message, "Directory path must not be empty");

        let reply = service
            .create_subdirectory(SubdirectoryRequest {
                parent_directory: "docs".into(),
                subdirectory_name: String::new(),
            })
            .unwrap();
        assert_eq!(
            reply.message,
            "Parent directory and subdirectory name must not be empty"
        );
    }

    #[test]
    fn missing_sources_are_not_found() {
        let (_dir, service) = service();
        let err = service
            .move_file(MoveRequest {
                source_path: "ghost.txt".into(),
                destination_path: "elsewhere.txt".into(),
            })
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);

        let err = service
            .rename_file(RenameRequest {
                old_name: "ghost.txt".into(),
                new_name: "other.txt".into(),
            })
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);

        let err = service
            .download_file(DownloadRequest { path: "ghost.txt".into() })
            .unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);
    }

    #[test]
    fn traversal_is_invalid_argument() {
        let (_dir, service) = service();
        let err = service
            .list_all(DirectoryRequest { path: "../..".into() })
            .unwrap_err();
        assert_eq!(err.code, StatusCode::InvalidArgument);
    }

    #[test]
    fn delete_of_missing_target_succeeds() {
        let (_dir, service) = service();
        let reply = service
            .delete_file(DeleteRequest { path: "nothing-here".into() })
            .unwrap();
        assert_eq!(reply.message, "File or directory does not exist");
    }
}
