//! CRUD operations for the `designs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw design row from the database.
///
/// `steps` holds the JSON-encoded step list.
#[derive(Debug, Clone)]
pub struct DesignRow {
    pub id: String,
    pub status: String,
    pub current_step_index: i64,
    pub steps: String,
    pub design_prompt: String,
    pub garment_image: Option<String>,
    pub style_swatch_image: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub revision: i64,
}

impl DesignRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            current_step_index: row.get("current_step_index")?,
            steps: row.get("steps")?,
            design_prompt: row.get("design_prompt")?,
            garment_image: row.get("garment_image")?,
            style_swatch_image: row.get("style_swatch_image")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
            revision: row.get("revision")?,
        })
    }
}

/// Query filter parameters for design listing.
#[derive(Debug, Default, Clone)]
pub struct DesignFilter {
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new design row.
pub fn insert(db: &Database, design: &DesignRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO designs (id, status, current_step_index, steps, design_prompt,
             garment_image, style_swatch_image, error_message, created_at, updated_at,
             completed_at, revision)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                design.id,
                design.status,
                design.current_step_index,
                design.steps,
                design.design_prompt,
                design.garment_image,
                design.style_swatch_image,
                design.error_message,
                design.created_at,
                design.updated_at,
                design.completed_at,
                design.revision,
            ],
        )?;
        Ok(())
    })
}

/// Updates an existing design row. All fields except `id`, `design_prompt`
/// and `created_at` are overwritten. Returns the number of rows changed.
pub fn update(db: &Database, design: &DesignRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE designs SET status=?2, current_step_index=?3, steps=?4,
             garment_image=?5, style_swatch_image=?6, error_message=?7,
             updated_at=?8, completed_at=?9, revision=?10
             WHERE id=?1",
            params![
                design.id,
                design.status,
                design.current_step_index,
                design.steps,
                design.garment_image,
                design.style_swatch_image,
                design.error_message,
                design.updated_at,
                design.completed_at,
                design.revision,
            ],
        )?;
        Ok(changed)
    })
}

/// Finds a design by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<DesignRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM designs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], DesignRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries designs with filters, returning (rows, total_count).
/// Rows are ordered newest first.
pub fn query(
    db: &Database,
    filter: &DesignFilter,
) -> Result<(Vec<DesignRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM designs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM designs {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<DesignRow> = stmt
            .query_map(params_ref.as_slice(), DesignRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts designs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM designs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
