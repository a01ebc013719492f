//! Parameterized SQL text of pending actions.
//!
//! The text doubles as the statement shape: actions are only batched
//! together when their SQL text is identical.
//!
//! ```text
//! insert into Person (address_ID, ID) values (?, ?)
//! update Person set name=? where ID=?
//! delete from Person where ID=?
//! ```

use alloc::string::String;

use crate::EntityMapping;

/// Appends `name=?` for each column, separated by `sep`.
fn push_assignments(sql: &mut String, mapping: &EntityMapping, columns: &[usize], sep: &str) {
    for (i, &col_idx) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(sep);
        }
        sql.push_str(&mapping.column_names()[col_idx]);
        sql.push_str("=?");
    }
}

/// Format an INSERT statement binding `columns`.
pub(super) fn format_insert(mapping: &EntityMapping, columns: &[usize]) -> String {
    let mut sql = String::from("insert into ");
    sql.push_str(mapping.table_name());

    sql.push_str(" (");
    for (i, &col_idx) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&mapping.column_names()[col_idx]);
    }
    sql.push_str(") values (");

    for i in 0..columns.len() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
    sql.push(')');
    sql
}

/// Format an UPDATE statement assigning `assigned`, keyed by the identifier columns.
pub(super) fn format_update(mapping: &EntityMapping, assigned: &[usize]) -> String {
    let mut sql = String::from("update ");
    sql.push_str(mapping.table_name());
    sql.push_str(" set ");
    push_assignments(&mut sql, mapping, assigned, ", ");
    sql.push_str(" where ");
    push_assignments(&mut sql, mapping, mapping.id_indices(), " and ");
    sql
}

/// Format a DELETE statement keyed by the identifier columns.
pub(super) fn format_delete(mapping: &EntityMapping) -> String {
    let mut sql = String::from("delete from ");
    sql.push_str(mapping.table_name());
    sql.push_str(" where ");
    push_assignments(&mut sql, mapping, mapping.id_indices(), " and ");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_table() -> EntityMapping {
        EntityMapping::new(
            "TeacherSkill",
            "teacher_skills",
            &["teacher_id", "skill_id", "level"],
            &["teacher_id", "skill_id"],
        )
        .unwrap()
    }

    #[test]
    fn test_format_insert() {
        let mapping = join_table();
        assert_eq!(
            format_insert(&mapping, &[0, 1, 2]),
            "insert into teacher_skills (teacher_id, skill_id, level) values (?, ?, ?)"
        );
    }

    #[test]
    fn test_format_update_composite_key() {
        let mapping = join_table();
        assert_eq!(
            format_update(&mapping, &[2]),
            "update teacher_skills set level=? where teacher_id=? and skill_id=?"
        );
    }

    #[test]
    fn test_format_delete_composite_key() {
        let mapping = join_table();
        assert_eq!(
            format_delete(&mapping),
            "delete from teacher_skills where teacher_id=? and skill_id=?"
        );
    }
}
