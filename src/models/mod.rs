// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - users : Utilisateurs (GUEST, USER, ADMIN)
//   - product : Produits numériques du storefront
//   - price : Paliers de prix d'un produit (le lien de livraison vit ici)
//   - product_region : Allow-list de pays par produit (géo-restriction)
//   - order : Commandes (machine à états PENDING -> COMPLETED | FAILED)
//   - setting : Paramètres clé/valeur (support, gateway actif, promos)
//   - popup_config : Configuration du popup promotionnel du storefront
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - IDs en String (UUID v4) générés côté application
//   - Les relations entre tables sont définies dans chaque modèle
//
// ============================================================================

pub mod users;
pub mod product;
pub mod price;
pub mod product_region;
pub mod order;
pub mod setting;
pub mod popup_config;
