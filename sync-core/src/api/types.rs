use serde::{Deserialize, Serialize};

/// Error body returned by the renter API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// `GET /daemon/version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonVersion {
    pub version: String,
    #[serde(rename = "gitrevision", default)]
    pub git_revision: Option<String>,
}

/// `GET /renter/dir/<siapath>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenterDirectory {
    #[serde(default)]
    pub directories: Option<Vec<DirectoryInfo>>,
    #[serde(default)]
    pub files: Option<Vec<FileInfo>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryInfo {
    #[serde(rename = "siapath")]
    pub sia_path: String,
}

/// A file known to the renter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "siapath")]
    pub sia_path: String,
    #[serde(rename = "filesize")]
    pub file_size: u64,
}

/// `GET /renter/file/<siapath>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenterFile {
    pub file: FileInfo,
}

/// Query string of `POST /renter/upload/<siapath>`
#[derive(Debug, Clone, Serialize)]
pub struct UploadParams {
    pub source: String,
    #[serde(rename = "datapieces")]
    pub data_pieces: u64,
    #[serde(rename = "paritypieces")]
    pub parity_pieces: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renter_directory_tolerates_null_lists() {
        let dir: RenterDirectory =
            serde_json::from_str(r#"{"directories": null, "files": null}"#).unwrap();
        assert!(dir.files.is_none());
        assert!(dir.directories.is_none());
    }

    #[test]
    fn test_renter_directory_parses_files() {
        let body = r#"{
            "directories": [{"siapath": "siasync"}, {"siapath": "siasync/docs"}],
            "files": [{"siapath": "siasync/a.txt", "filesize": 100, "available": true}]
        }"#;
        let dir: RenterDirectory = serde_json::from_str(body).unwrap();
        let files = dir.files.unwrap();
        assert_eq!(files[0].sia_path, "siasync/a.txt");
        assert_eq!(files[0].file_size, 100);
        assert_eq!(dir.directories.unwrap().len(), 2);
    }

    #[test]
    fn test_upload_params_query() {
        let params = UploadParams {
            source: "/tmp/a b.txt".to_string(),
            data_pieces: 10,
            parity_pieces: 30,
        };
        let query = serde_urlencoded::to_string(&params).unwrap();
        assert_eq!(query, "source=%2Ftmp%2Fa+b.txt&datapieces=10&paritypieces=30");
    }
}
