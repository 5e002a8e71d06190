use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use std::collections::HashMap;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::ClientError;
use crate::protocol::{
    Call, ContentEncoding, DeleteRequest, DirectoryRequest, DownloadReply, DownloadRequest,
    ListAllReply, MoveRequest, RenameRequest, Reply, RequestFrame, ResponseFrame,
    StatusReply, SubdirectoryRequest, UploadFileRequest, UploadReply, read_frame, write_frame,
};

const MAX_RESPONSE_BYTES: usize = 256 * 1024 * 1024;

/// Typed client for one storage node connection.
///
/// Calls are issued one at a time; responses for other ids that arrive in between
/// (after [`send`](Self::send)) are buffered until asked for.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
    pending: HashMap<u64, ResponseFrame>,
}

impl Client {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 1,
            pending: HashMap::new(),
        })
    }

    /// Sends a call without waiting; returns its request id.
    pub async fn send(&mut self, call: Call) -> Result<u64, ClientError> {
        let id = self.next_id;
        self.next_id += 1;
        debug!("Sending #{} {}", id, call.method());
        write_frame(&mut self.writer, &RequestFrame { id, call }).await?;
        Ok(id)
    }

    /// Waits for the response to request `id`.
    pub async fn receive(&mut self, id: u64) -> Result<ResponseFrame, ClientError> {
        if let Some(frame) = self.pending.remove(&id) {
            return Ok(frame);
        }
        loop {
            let bytes = read_frame(&mut self.reader, MAX_RESPONSE_BYTES)
                .await?
                .ok_or(ClientError::Disconnected)?;
            let frame: ResponseFrame = serde_json::from_slice(&bytes)?;
            if frame.id == id {
                return Ok(frame);
            }
            self.pending.insert(frame.id, frame);
        }
    }

    pub async fn call(&mut self, call: Call) -> Result<Reply, ClientError> {
        let id = self.send(call).await?;
        self.receive(id)
            .await?
            .into_result()
            .map_err(ClientError::Status)
    }

    pub async fn upload_file(
        &mut self,
        filename: &str,
        content: &[u8],
        directory: Option<&str>,
    ) -> Result<UploadReply, ClientError> {
        let request = UploadFileRequest {
            filename: filename.to_string(),
            content: STANDARD.encode(content),
            encoding: ContentEncoding::Base64,
            directory: directory.map(str::to_string),
        };
        match self.call(Call::UploadFile(request)).await? {
            Reply::Upload(reply) => Ok(reply),
            _ => Err(ClientError::UnexpectedReply("UploadFile")),
        }
    }

    pub async fn create_directory(&mut self, path: &str) -> Result<StatusReply, ClientError> {
        let call = Call::CreateDirectory(DirectoryRequest {
            path: path.to_string(),
        });
        self.status_call(call, "CreateDirectory").await
    }

    pub async fn create_subdirectory(
        &mut self,
        parent: &str,
        name: &str,
    ) -> Result<StatusReply, ClientError> {
        let call = Call::CreateSubdirectory(SubdirectoryRequest {
            parent_directory: parent.to_string(),
            subdirectory_name: name.to_string(),
        });
        self.status_call(call, "CreateSubdirectory").await
    }

    pub async fn delete_file(&mut self, path: &str) -> Result<StatusReply, ClientError> {
        let call = Call::DeleteFile(DeleteRequest {
            path: path.to_string(),
        });
        self.status_call(call, "DeleteFile").await
    }

    pub async fn rename_file(&mut self, old: &str, new: &str) -> Result<StatusReply, ClientError> {
        let call = Call::RenameFile(RenameRequest {
            old_name: old.to_string(),
            new_name: new.to_string(),
        });
        self.status_call(call, "RenameFile").await
    }

    pub async fn move_file(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<StatusReply, ClientError> {
        let call = Call::MoveFile(MoveRequest {
            source_path: source.to_string(),
            destination_path: destination.to_string(),
        });
        self.status_call(call, "MoveFile").await
    }

    pub async fn list_files(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        let call = Call::ListFiles(DirectoryRequest {
            path: path.to_string(),
        });
        match self.call(call).await? {
            Reply::List(reply) => Ok(reply.entries),
            _ => Err(ClientError::UnexpectedReply("ListFiles")),
        }
    }

    pub async fn list_directories(&mut self, path: &str) -> Result<Vec<String>, ClientError> {
        let call = Call::ListDirectories(DirectoryRequest {
            path: path.to_string(),
        });
        match self.call(call).await? {
            Reply::List(reply) => Ok(reply.entries),
            _ => Err(ClientError::UnexpectedReply("ListDirectories")),
        }
    }

    pub async fn list_all(&mut self, path: &str) -> Result<ListAllReply, ClientError> {
        let call = Call::ListAll(DirectoryRequest {
            path: path.to_string(),
        });
        match self.call(call).await? {
            Reply::ListAll(reply) => Ok(reply),
            _ => Err(ClientError::UnexpectedReply("ListAll")),
        }
    }

    pub async fn download_file(&mut self, path: &str) -> Result<DownloadReply, ClientError> {
        let call = Call::DownloadFile(DownloadRequest {
            path: path.to_string(),
        });
        match self.call(call).await? {
            Reply::Download(reply) => Ok(reply),
            _ => Err(ClientError::UnexpectedReply("DownloadFile")),
        }
    }

    /// Downloads `path` and decodes its content.
    pub async fn download_bytes(&mut self, path: &str) -> Result<Vec<u8>, ClientError> {
        let reply = self.download_file(path).await?;
        STANDARD
            .decode(reply.content_base64)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn status_call(
        &mut self,
        call: Call,
        method: &'static str,
    ) -> Result<StatusReply, ClientError> {
        match self.call(call).await? {
            Reply::Status(reply) => Ok(reply),
            _ => Err(ClientError::UnexpectedReply(method)),
        }
    }
}
