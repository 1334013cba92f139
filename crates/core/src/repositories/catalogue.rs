//! Medicine and laboratory test catalogues.
//!
//! Prescription line items may reference catalogue rows; deleting a row keeps the line item
//! and clears its reference.

use crate::db::{contains_pattern, not_found, now_timestamp, Database};
use crate::validation::{self, ValidationErrors, LONG_TEXT_MAX, SHORT_TEXT_MAX};
use crate::{ClinicError, ClinicResult};
use api_shared::{LabTest, LabTestReq, Medicine, MedicineReq};
use rusqlite::{params, Connection, Row};

const MEDICINE_SELECT: &str = "SELECT id, name, generic_name, category, strength, form,
        manufacturer, price, stock, description, created_at
    FROM medicines";

const TEST_SELECT: &str =
    "SELECT id, name, category, description, price, created_at FROM tests";

fn medicine_from_row(row: &Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        name: row.get(1)?,
        generic_name: row.get(2)?,
        category: row.get(3)?,
        strength: row.get(4)?,
        form: row.get(5)?,
        manufacturer: row.get(6)?,
        price: row.get(7)?,
        stock: row.get(8)?,
        description: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn test_from_row(row: &Row<'_>) -> rusqlite::Result<LabTest> {
    Ok(LabTest {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn load_medicine(conn: &Connection, id: i64) -> ClinicResult<Medicine> {
    conn.query_row(&format!("{MEDICINE_SELECT} WHERE id = ?1"), [id], medicine_from_row)
        .map_err(not_found("medicine"))
}

fn load_test(conn: &Connection, id: i64) -> ClinicResult<LabTest> {
    conn.query_row(&format!("{TEST_SELECT} WHERE id = ?1"), [id], test_from_row)
        .map_err(not_found("test"))
}

struct MedicineFields {
    name: Option<String>,
    generic_name: Option<String>,
    category: Option<String>,
    strength: Option<String>,
    form: Option<String>,
    manufacturer: Option<String>,
    price: Option<f64>,
    stock: Option<i64>,
    description: Option<String>,
}

/// Validates a medicine request. `name` is required on create only.
fn validate_medicine(req: &MedicineReq, creating: bool) -> ClinicResult<MedicineFields> {
    let mut errors = ValidationErrors::new();
    let name = if creating || req.name.is_some() {
        validation::required_text(&mut errors, "name", req.name.as_deref(), SHORT_TEXT_MAX)
            .map(|n| n.into_inner())
    } else {
        None
    };
    let mut short = |field: &str, value: &Option<String>| {
        validation::optional_text(&mut errors, field, value.as_deref(), SHORT_TEXT_MAX)
    };
    let generic_name = short("generic_name", &req.generic_name);
    let category = short("category", &req.category);
    let strength = short("strength", &req.strength);
    let form = short("form", &req.form);
    let manufacturer = short("manufacturer", &req.manufacturer);
    let price = validation::non_negative(&mut errors, "price", req.price);
    let stock = validation::int_between(&mut errors, "stock", req.stock, 0, i64::from(i32::MAX));
    let description = validation::optional_text(
        &mut errors,
        "description",
        req.description.as_deref(),
        LONG_TEXT_MAX,
    );
    errors.into_result()?;
    Ok(MedicineFields {
        name,
        generic_name,
        category,
        strength,
        form,
        manufacturer,
        price,
        stock,
        description,
    })
}

struct TestFields {
    name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    price: Option<f64>,
}

fn validate_test(req: &LabTestReq, creating: bool) -> ClinicResult<TestFields> {
    let mut errors = ValidationErrors::new();
    let name = if creating || req.name.is_some() {
        validation::required_text(&mut errors, "name", req.name.as_deref(), SHORT_TEXT_MAX)
            .map(|n| n.into_inner())
    } else {
        None
    };
    let category = validation::optional_text(
        &mut errors,
        "category",
        req.category.as_deref(),
        SHORT_TEXT_MAX,
    );
    let description = validation::optional_text(
        &mut errors,
        "description",
        req.description.as_deref(),
        LONG_TEXT_MAX,
    );
    let price = validation::non_negative(&mut errors, "price", req.price);
    errors.into_result()?;
    Ok(TestFields {
        name,
        category,
        description,
        price,
    })
}

#[derive(Clone, Debug)]
pub struct CatalogueService {
    db: Database,
}

impl CatalogueService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // MEDICINES
    // ========================================================================

    /// Medicines ordered by name, optionally matching `search` on name or generic name.
    pub fn list_medicines(&self, search: Option<&str>) -> ClinicResult<Vec<Medicine>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{MEDICINE_SELECT}
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\' OR generic_name LIKE ?1 ESCAPE '\\'
             ORDER BY name, id"
        ))?;
        let rows = stmt.query_map([contains_pattern(search)], medicine_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_medicine(&self, id: i64) -> ClinicResult<Medicine> {
        let conn = self.db.lock()?;
        load_medicine(&conn, id)
    }

    pub fn create_medicine(&self, req: &MedicineReq) -> ClinicResult<Medicine> {
        let fields = validate_medicine(req, true)?;
        let Some(name) = fields.name else {
            return Err(ClinicError::InvalidInput("medicine name missing".into()));
        };
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO medicines (name, generic_name, category, strength, form, manufacturer,
                price, stock, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                name,
                fields.generic_name,
                fields.category,
                fields.strength,
                fields.form,
                fields.manufacturer,
                fields.price.unwrap_or(0.0),
                fields.stock.unwrap_or(0),
                fields.description,
                now_timestamp(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(medicine_id = id, "medicine added to catalogue");
        load_medicine(&conn, id)
    }

    /// Partial update; absent fields keep their value.
    pub fn update_medicine(&self, id: i64, req: &MedicineReq) -> ClinicResult<Medicine> {
        let fields = validate_medicine(req, false)?;
        let conn = self.db.lock()?;
        load_medicine(&conn, id)?;
        conn.execute(
            "UPDATE medicines SET
                name = COALESCE(?1, name),
                generic_name = COALESCE(?2, generic_name),
                category = COALESCE(?3, category),
                strength = COALESCE(?4, strength),
                form = COALESCE(?5, form),
                manufacturer = COALESCE(?6, manufacturer),
                price = COALESCE(?7, price),
                stock = COALESCE(?8, stock),
                description = COALESCE(?9, description)
             WHERE id = ?10",
            params![
                fields.name,
                fields.generic_name,
                fields.category,
                fields.strength,
                fields.form,
                fields.manufacturer,
                fields.price,
                fields.stock,
                fields.description,
                id,
            ],
        )?;
        load_medicine(&conn, id)
    }

    pub fn delete_medicine(&self, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        if conn.execute("DELETE FROM medicines WHERE id = ?1", [id])? == 0 {
            return Err(ClinicError::NotFound("medicine"));
        }
        tracing::info!(medicine_id = id, "medicine removed from catalogue");
        Ok(())
    }

    // ========================================================================
    // LAB TESTS
    // ========================================================================

    pub fn list_tests(&self, search: Option<&str>) -> ClinicResult<Vec<LabTest>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{TEST_SELECT} WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\' ORDER BY name, id"
        ))?;
        let rows = stmt.query_map([contains_pattern(search)], test_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_test(&self, id: i64) -> ClinicResult<LabTest> {
        let conn = self.db.lock()?;
        load_test(&conn, id)
    }

    pub fn create_test(&self, req: &LabTestReq) -> ClinicResult<LabTest> {
        let fields = validate_test(req, true)?;
        let Some(name) = fields.name else {
            return Err(ClinicError::InvalidInput("test name missing".into()));
        };
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO tests (name, category, description, price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                fields.category,
                fields.description,
                fields.price.unwrap_or(0.0),
                now_timestamp(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(test_id = id, "test added to catalogue");
        load_test(&conn, id)
    }

    pub fn update_test(&self, id: i64, req: &LabTestReq) -> ClinicResult<LabTest> {
        let fields = validate_test(req, false)?;
        let conn = self.db.lock()?;
        load_test(&conn, id)?;
        conn.execute(
            "UPDATE tests SET
                name = COALESCE(?1, name),
                category = COALESCE(?2, category),
                description = COALESCE(?3, description),
                price = COALESCE(?4, price)
             WHERE id = ?5",
            params![fields.name, fields.category, fields.description, fields.price, id],
        )?;
        load_test(&conn, id)
    }

    pub fn delete_test(&self, id: i64) -> ClinicResult<()> {
        let conn = self.db.lock()?;
        if conn.execute("DELETE FROM tests WHERE id = ?1", [id])? == 0 {
            return Err(ClinicError::NotFound("test"));
        }
        tracing::info!(test_id = id, "test removed from catalogue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paracetamol() -> MedicineReq {
        MedicineReq {
            name: Some("Paracetamol".into()),
            generic_name: Some("Acetaminophen".into()),
            price: Some(2.5),
            stock: Some(100),
            ..Default::default()
        }
    }

    #[test]
    fn price_and_stock_must_be_non_negative() {
        let db = Database::open_in_memory().unwrap();
        let service = CatalogueService::new(db);
        let bad = MedicineReq {
            price: Some(-1.0),
            stock: Some(-3),
            ..paracetamol()
        };
        let ClinicError::Validation(errors) = service.create_medicine(&bad).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.has("price"));
        assert!(errors.has("stock"));

        let bad_test = LabTestReq {
            name: None,
            price: Some(-10.0),
            ..Default::default()
        };
        let ClinicError::Validation(errors) = service.create_test(&bad_test).unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.has("name"));
        assert!(errors.has("price"));
    }

    #[test]
    fn search_matches_name_or_generic_name() {
        let db = Database::open_in_memory().unwrap();
        let service = CatalogueService::new(db);
        service.create_medicine(&paracetamol()).unwrap();
        service
            .create_medicine(&MedicineReq {
                name: Some("Ibuprofen".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(service.list_medicines(None).unwrap().len(), 2);
        assert_eq!(service.list_medicines(Some("acetamin")).unwrap().len(), 1);
        assert_eq!(service.list_medicines(Some("  ")).unwrap().len(), 2);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let db = Database::open_in_memory().unwrap();
        let service = CatalogueService::new(db);
        service.create_medicine(&paracetamol()).unwrap();
        service
            .create_medicine(&MedicineReq {
                name: Some("Vitamin B_12".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(service.list_medicines(Some("%")).unwrap().is_empty());
        let underscored = service.list_medicines(Some("_")).unwrap();
        assert_eq!(underscored.len(), 1);
        assert_eq!(underscored[0].name, "Vitamin B_12");
        assert_eq!(service.list_tests(Some("%")).unwrap().len(), 0);
    }

    #[test]
    fn update_is_partial_and_delete_reports_missing() {
        let db = Database::open_in_memory().unwrap();
        let service = CatalogueService::new(db);
        let created = service.create_medicine(&paracetamol()).unwrap();

        let updated = service
            .update_medicine(
                created.id,
                &MedicineReq {
                    stock: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.stock, 5);
        assert_eq!(updated.name, "Paracetamol");
        assert!((updated.price - 2.5).abs() < f64::EPSILON);

        service.delete_medicine(created.id).unwrap();
        assert!(matches!(
            service.delete_medicine(created.id),
            Err(ClinicError::NotFound("medicine"))
        ));
    }

    #[test]
    fn lab_tests_crud() {
        let db = Database::open_in_memory().unwrap();
        let service = CatalogueService::new(db);
        let created = service
            .create_test(&LabTestReq {
                name: Some("Lipid panel".into()),
                category: Some("Blood".into()),
                price: Some(30.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(service.list_tests(Some("lipid")).unwrap().len(), 1);

        let updated = service
            .update_test(
                created.id,
                &LabTestReq {
                    price: Some(25.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.category.as_deref(), Some("Blood"));
        service.delete_test(created.id).unwrap();
        assert!(matches!(service.get_test(created.id), Err(ClinicError::NotFound(_))));
    }
}
