use tera::{Context, Tera};

use crate::error::BackendError;

const DISCOUNT_EMAIL: &str = "discount_email.html";

/// Message templates, compiled once at startup.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    pub fn new() -> Result<Self, BackendError> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            DISCOUNT_EMAIL,
            include_str!("../templates/discount_email.html"),
        )?;
        Ok(Self { tera })
    }

    pub fn discount_email(
        &self,
        code: &str,
        order_id: &str,
        customer_name: &str,
    ) -> Result<String, BackendError> {
        let mut ctx = Context::new();
        ctx.insert("code", code);
        ctx.insert("order_id", order_id);
        ctx.insert("customer_name", customer_name);
        Ok(self.tera.render(DISCOUNT_EMAIL, &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_email_contains_code_and_order() {
        let templates = Templates::new().unwrap();
        let html = templates.discount_email("UGC-AB12-CD34", "ORD-77", "Ewa").unwrap();
        assert!(html.contains("UGC-AB12-CD34"));
        assert!(html.contains("ORD-77"));
        assert!(html.contains("Congratulations, Ewa!"));
    }
}
