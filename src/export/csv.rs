use super::ExportError;
use crate::models::User;

const HEADER: [&str; 2] = ["name", "email"];

/// `name,email` listing with standard quoting for delimiters and quotes
pub fn to_csv(users: &[User]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for user in users {
        writer.write_record([user.name.as_str(), user.email.as_str()])?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}
