use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use sha2::Sha256;
use std::env;

type HmacSha256 = Hmac<Sha256>;

/// Client du gateway PushinPay (PIX).
/// Construit une fois au démarrage et partagé via web::Data.
#[derive(Clone)]
pub struct PushinPayClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

/// Charge PIX créée par le gateway
#[derive(Debug, Clone, Deserialize)]
pub struct PixCharge {
    pub id: String,
    pub status: String,
    pub value: i64,
    pub qr_code: String,        // code PIX "copia e cola"
    pub qr_code_base64: String, // image QR encodée en base64
}

impl PushinPayClient {
    pub fn from_env() -> Self {
        let token = env::var("PUSHINPAY_TOKEN").unwrap_or_else(|_| {
            eprintln!("⚠️  WARNING: PUSHINPAY_TOKEN not set, gateway calls will fail");
            String::new()
        });
        let api_url = env::var("PUSHINPAY_API_URL")
            .unwrap_or_else(|_| "https://api.pushinpay.com.br".to_string());

        if env::var("PUSHINPAY_WEBHOOK_SECRET").map(|s| s.is_empty()).unwrap_or(true) {
            eprintln!("⚠️  WARNING: PUSHINPAY_WEBHOOK_SECRET not set, incoming webhooks will be rejected");
        }

        PushinPayClient {
            http: reqwest::Client::new(),
            api_url,
            token,
        }
    }

    /// Crée une charge PIX. Le montant est en centimes; le gateway
    /// notifiera webhook_url à chaque changement de statut.
    pub async fn create_pix_charge(
        &self,
        value_cents: i64,
        webhook_url: &str,
    ) -> Result<PixCharge, String> {
        let response = self
            .http
            .post(format!("{}/api/pix/cashIn", self.api_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "value": value_cents,
                "webhook_url": webhook_url,
            }))
            .send()
            .await
            .map_err(|e| format!("PushinPay request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("PushinPay returned status {}", response.status()));
        }

        response
            .json::<PixCharge>()
            .await
            .map_err(|e| format!("Invalid PushinPay response: {}", e))
    }

    /// Interroge le statut d'une transaction.
    /// PushinPay limite cet endpoint à un appel par minute et par
    /// transaction (contrainte externe, non imposée ici).
    pub async fn get_transaction(&self, tx_id: &str) -> Result<serde_json::Value, String> {
        let response = self
            .http
            .get(format!("{}/api/transactions/{}", self.api_url, tx_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| format!("PushinPay request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("PushinPay returned status {}", response.status()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| format!("Invalid PushinPay response: {}", e))
    }
}

/// Convertit un montant décimal en centimes entiers (représentation
/// attendue par le gateway)
pub fn amount_to_cents(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).round().to_i64()
}

/// Formate un montant pour l'affichage client ("R$ 49,90")
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    match currency {
        "BRL" => format!("R$ {}", format!("{:.2}", amount).replace('.', ",")),
        "USD" => format!("$ {:.2}", amount),
        _ => format!("{} {:.2}", currency, amount),
    }
}

/// Vérifie la signature HMAC-SHA256 (hex) d'un webhook contre le secret
/// partagé. Le corps brut de la requête doit être utilisé, pas le JSON
/// re-sérialisé. Un secret vide (PUSHINPAY_WEBHOOK_SECRET non configuré)
/// rejette tous les webhooks: un HMAC à clé vide est forgeable par
/// n'importe qui.
pub fn verify_webhook_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    let expected = hex::encode(mac.finalize().into_bytes());
    expected.eq_ignore_ascii_case(signature.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_amount_to_cents() {
        assert_eq!(amount_to_cents(Decimal::from_str("10.50").unwrap()), Some(1050));
        assert_eq!(amount_to_cents(Decimal::from_str("49.90").unwrap()), Some(4990));
        assert_eq!(amount_to_cents(Decimal::from(5)), Some(500));
    }

    #[test]
    fn test_format_amount_brl() {
        let amount = Decimal::from_str("49.90").unwrap();
        assert_eq!(format_amount(amount, "BRL"), "R$ 49,90");
    }

    #[test]
    fn test_format_amount_usd() {
        let amount = Decimal::from_str("9.99").unwrap();
        assert_eq!(format_amount(amount, "USD"), "$ 9.99");
    }

    #[test]
    fn test_webhook_signature_roundtrip() {
        let payload = br#"{"id":"tx-1","status":"paid"}"#;
        let signature = sign(payload, "webhook-secret");

        assert!(verify_webhook_signature(payload, &signature, "webhook-secret"));
    }

    #[test]
    fn test_webhook_signature_rejects_tampered_payload() {
        let signature = sign(br#"{"id":"tx-1","status":"paid"}"#, "webhook-secret");

        assert!(!verify_webhook_signature(
            br#"{"id":"tx-1","status":"expired"}"#,
            &signature,
            "webhook-secret"
        ));
    }

    #[test]
    fn test_webhook_signature_rejects_empty_secret() {
        let payload = br#"{"id":"tx-1","status":"paid"}"#;
        // Signature calculée avec une clé vide: forgeable, donc refusée
        let forged = sign(payload, "");

        assert!(!verify_webhook_signature(payload, &forged, ""));
    }

    #[test]
    fn test_webhook_signature_rejects_wrong_secret() {
        let payload = br#"{"id":"tx-1","status":"paid"}"#;
        let signature = sign(payload, "webhook-secret");

        assert!(!verify_webhook_signature(payload, &signature, "other-secret"));
    }
}
