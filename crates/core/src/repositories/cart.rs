//! Patient storefront cart. One line per (patient, medicine).

use crate::db::{not_found, now_timestamp, Database};
use crate::ownership::ensure_patient_owns;
use crate::repositories::catalogue::load_medicine;
use crate::validation::{self, ValidationErrors};
use crate::{ClinicError, ClinicResult};
use api_shared::{AddCartItemReq, Cart, CartItem, UpdateCartItemReq};
use rusqlite::{params, Connection};

/// Largest quantity a single cart line may hold.
const MAX_QUANTITY: i64 = 1000;

fn quantity(errors: &mut ValidationErrors, value: Option<i64>) -> Option<i64> {
    if value.is_none() {
        errors.add("quantity", "The quantity field is required.");
    }
    validation::int_between(errors, "quantity", value, 1, MAX_QUANTITY)
}

fn line_owner(conn: &Connection, id: i64) -> ClinicResult<i64> {
    conn.query_row("SELECT patient_id FROM cart_items WHERE id = ?1", [id], |row| {
        row.get(0)
    })
    .map_err(not_found("cart item"))
}

#[derive(Clone, Debug)]
pub struct CartService {
    db: Database,
}

impl CartService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The patient's cart with line totals and the grand total.
    pub fn get(&self, patient_id: i64) -> ClinicResult<Cart> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.medicine_id, m.name, m.price, c.quantity
             FROM cart_items c
             JOIN medicines m ON m.id = c.medicine_id
             WHERE c.patient_id = ?1
             ORDER BY c.id",
        )?;
        let items = stmt
            .query_map([patient_id], |row| {
                let unit_price: f64 = row.get(3)?;
                let quantity: i64 = row.get(4)?;
                Ok(CartItem {
                    id: row.get(0)?,
                    medicine_id: row.get(1)?,
                    medicine_name: row.get(2)?,
                    unit_price,
                    quantity,
                    line_total: unit_price * quantity as f64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let total = items.iter().map(|item| item.line_total).sum();
        Ok(Cart { items, total })
    }

    /// Add a medicine; an existing line for the same medicine has its quantity increased.
    pub fn add(&self, patient_id: i64, req: &AddCartItemReq) -> ClinicResult<Cart> {
        let mut errors = ValidationErrors::new();
        let medicine_id = validation::required_id(&mut errors, "medicine_id", req.medicine_id);
        let quantity = quantity(&mut errors, req.quantity);
        {
            let conn = self.db.lock()?;
            if let Some(id) = medicine_id {
                match load_medicine(&conn, id) {
                    Ok(_) => {}
                    Err(ClinicError::NotFound(_)) => {
                        errors.add("medicine_id", "The selected medicine id is invalid.")
                    }
                    Err(e) => return Err(e),
                }
            }
            errors.into_result()?;
            let (Some(medicine_id), Some(quantity)) = (medicine_id, quantity) else {
                return Err(ClinicError::InvalidInput("cart fields missing".into()));
            };

            let now = now_timestamp();
            conn.execute(
                "INSERT INTO cart_items (patient_id, medicine_id, quantity, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (patient_id, medicine_id)
                 DO UPDATE SET quantity = MIN(quantity + excluded.quantity, ?5),
                               updated_at = excluded.updated_at",
                params![patient_id, medicine_id, quantity, now, MAX_QUANTITY],
            )?;
            tracing::debug!(patient_id, medicine_id, quantity, "cart item added");
        }
        self.get(patient_id)
    }

    pub fn update(
        &self,
        patient_id: i64,
        item_id: i64,
        req: &UpdateCartItemReq,
    ) -> ClinicResult<Cart> {
        let mut errors = ValidationErrors::new();
        let quantity = quantity(&mut errors, req.quantity);
        {
            let conn = self.db.lock()?;
            ensure_patient_owns(Some(line_owner(&conn, item_id)?), patient_id)?;
            errors.into_result()?;
            conn.execute(
                "UPDATE cart_items SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                params![quantity, now_timestamp(), item_id],
            )?;
        }
        self.get(patient_id)
    }

    pub fn remove(&self, patient_id: i64, item_id: i64) -> ClinicResult<Cart> {
        {
            let conn = self.db.lock()?;
            ensure_patient_owns(Some(line_owner(&conn, item_id)?), patient_id)?;
            conn.execute("DELETE FROM cart_items WHERE id = ?1", [item_id])?;
        }
        self.get(patient_id)
    }

    /// Empty the cart. Returns the number of lines removed.
    pub fn clear(&self, patient_id: i64) -> ClinicResult<usize> {
        let conn = self.db.lock()?;
        let removed = conn.execute("DELETE FROM cart_items WHERE patient_id = ?1", [patient_id])?;
        tracing::debug!(patient_id, removed, "cart cleared");
        Ok(removed)
    }
}
