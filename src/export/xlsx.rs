use rust_xlsxwriter::{Format, Workbook};

use super::ExportError;
use crate::models::User;

pub const SHEET_NAME: &str = "Usuarios";

/// Column titles, the record's own field names
pub const COLUMNS: [&str; 6] = ["id", "name", "email", "role", "profileImageUrl", "uid"];

/// Cell values of one record, in `COLUMNS` order
pub fn row(user: &User) -> [String; 6] {
    [
        user.id.clone(),
        user.name.clone(),
        user.email.clone(),
        user.role.as_str().to_string(),
        user.profile_image_url.clone().unwrap_or_default(),
        user.uid.clone().unwrap_or_default(),
    ]
}

/// Header plus one row per record; exactly what the worksheet holds
pub fn table(users: &[User]) -> Vec<[String; 6]> {
    let header = COLUMNS.map(str::to_string);
    std::iter::once(header).chain(users.iter().map(row)).collect()
}

/// Single-sheet workbook with a bold header row
pub fn to_xlsx(users: &[User]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (line, cells) in table(users).iter().enumerate() {
        for (col, value) in cells.iter().enumerate() {
            if line == 0 {
                sheet.write_string_with_format(0, col as u16, value, &header)?;
            } else if !value.is_empty() {
                sheet.write_string(line as u32, col as u16, value)?;
            }
        }
    }

    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn admin() -> User {
        User {
            id: "abc".to_string(),
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            role: Role::Admin,
            profile_image_url: Some("https://img/1.png".to_string()),
            uid: None,
        }
    }

    #[test]
    fn test_row_follows_column_order() {
        assert_eq!(
            row(&admin()),
            [
                "abc".to_string(),
                "Ana".to_string(),
                "ana@x.com".to_string(),
                "admin".to_string(),
                "https://img/1.png".to_string(),
                String::new(),
            ]
        );
    }

    #[test]
    fn test_columns_match_serialized_field_names() {
        let value = serde_json::to_value(admin()).unwrap();
        let object = value.as_object().unwrap();
        for column in COLUMNS {
            assert!(object.contains_key(column), "missing {}", column);
        }
        assert_eq!(object.len(), COLUMNS.len());
    }

    #[test]
    fn test_repeated_exports_hold_the_same_sheet() {
        let mut regular = admin();
        regular.id = "def".to_string();
        regular.role = Role::Regular;
        regular.uid = Some("uid-2".to_string());
        let users = vec![admin(), regular];

        let first = table(&users);
        let second = table(&users);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], COLUMNS.map(str::to_string));
        assert_eq!(first[1], row(&users[0]));
        assert_eq!(first[2][5], "uid-2");

        assert!(to_xlsx(&users).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_workbook_is_a_zip_container() {
        let bytes = to_xlsx(&[admin()]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
