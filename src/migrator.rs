use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_restaurants_table::Migration),
            Box::new(m20240101_000002_create_users_table::Migration),
            Box::new(m20240101_000003_create_branches_table::Migration),
            Box::new(m20240101_000004_create_inventory_items_table::Migration),
            Box::new(m20240101_000005_create_recipe_tables::Migration),
            Box::new(m20240101_000006_create_menu_items_table::Migration),
            Box::new(m20240101_000007_create_order_tables::Migration),
            Box::new(m20240101_000008_create_billing_tables::Migration),
            Box::new(m20240101_000009_create_support_tables::Migration),
            Box::new(m20240101_000010_create_chat_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_restaurants_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_restaurants_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create restaurants table aligned with entities::restaurant Model
            manager
                .create_table(
                    Table::create()
                        .table(Restaurants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Restaurants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Restaurants::Name).string().not_null())
                        .col(
                            ColumnDef::new(Restaurants::BusinessType)
                                .string()
                                .not_null()
                                .default("restaurant"),
                        )
                        .col(
                            ColumnDef::new(Restaurants::VatRegistrationNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Restaurants::Status)
                                .string()
                                .not_null()
                                .default("pending_setup"),
                        )
                        .col(
                            ColumnDef::new(Restaurants::SubscriptionPlan)
                                .string()
                                .not_null()
                                .default("basic"),
                        )
                        .col(
                            ColumnDef::new(Restaurants::SubscriptionStatus)
                                .string()
                                .not_null()
                                .default("active"),
                        )
                        .col(
                            ColumnDef::new(Restaurants::BranchLimit)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Restaurants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Restaurants::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_restaurants_status")
                        .table(Restaurants::Table)
                        .col(Restaurants::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Restaurants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Restaurants {
        Table,
        Id,
        Name,
        BusinessType,
        VatRegistrationNumber,
        Status,
        SubscriptionPlan,
        SubscriptionStatus,
        BranchLimit,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_users_table {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // IT staff carry a null restaurant_id; everyone else belongs to
            // exactly one tenant.
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Users::DisplayName).string().null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(ColumnDef::new(Users::Permissions).json().not_null())
                        .col(ColumnDef::new(Users::RestaurantId).uuid().null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::LastLoginAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Users::ResetTokenDigest).string().null())
                        .col(
                            ColumnDef::new(Users::ResetTokenExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_users_restaurant_id")
                                .from(Users::Table, Users::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_restaurant_id")
                        .table(Users::Table)
                        .col(Users::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        DisplayName,
        Role,
        Permissions,
        RestaurantId,
        IsActive,
        LastLoginAt,
        ResetTokenDigest,
        ResetTokenExpiresAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_branches_table {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_branches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Branches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Branches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Branches::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(Branches::Name).string().not_null())
                        .col(ColumnDef::new(Branches::Location).string().null())
                        .col(
                            ColumnDef::new(Branches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_branches_restaurant_id")
                                .from(Branches::Table, Branches::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_branches_restaurant_id")
                        .table(Branches::Table)
                        .col(Branches::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Branches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Branches {
        Table,
        Id,
        RestaurantId,
        Name,
        Location,
        CreatedAt,
    }
}

mod m20240101_000004_create_inventory_items_table {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Quantities are decimal because ingredients are weighed (kg, l),
            // not counted.
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::RestaurantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::BranchId).uuid().null())
                        .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Quantity)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(InventoryItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::CostPerUnit)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::LowStockThreshold)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_items_restaurant_id")
                                .from(InventoryItems::Table, InventoryItems::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_restaurant_id")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryItems {
        Table,
        Id,
        RestaurantId,
        BranchId,
        Name,
        Quantity,
        Unit,
        CostPerUnit,
        LowStockThreshold,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_recipe_tables {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use super::m20240101_000004_create_inventory_items_table::InventoryItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_recipe_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create recipes table
            manager
                .create_table(
                    Table::create()
                        .table(Recipes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Recipes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Recipes::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(Recipes::Name).string().not_null())
                        .col(
                            ColumnDef::new(Recipes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Recipes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipes_restaurant_id")
                                .from(Recipes::Table, Recipes::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Create recipe_ingredients table; deleting an inventory item a
            // recipe still references is rejected at the database level.
            manager
                .create_table(
                    Table::create()
                        .table(RecipeIngredients::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RecipeIngredients::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecipeIngredients::RecipeId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecipeIngredients::InventoryItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RecipeIngredients::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RecipeIngredients::Unit).string().not_null())
                        .col(
                            ColumnDef::new(RecipeIngredients::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RecipeIngredients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipe_ingredients_recipe_id")
                                .from(RecipeIngredients::Table, RecipeIngredients::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipe_ingredients_inventory_item_id")
                                .from(
                                    RecipeIngredients::Table,
                                    RecipeIngredients::InventoryItemId,
                                )
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_recipes_restaurant_id")
                        .table(Recipes::Table)
                        .col(Recipes::RestaurantId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_recipe_ingredients_recipe_id")
                        .table(RecipeIngredients::Table)
                        .col(RecipeIngredients::RecipeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RecipeIngredients::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Recipes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Recipes {
        Table,
        Id,
        RestaurantId,
        Name,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RecipeIngredients {
        Table,
        Id,
        RecipeId,
        InventoryItemId,
        Quantity,
        Unit,
        Position,
        CreatedAt,
    }
}

mod m20240101_000006_create_menu_items_table {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use super::m20240101_000005_create_recipe_tables::Recipes;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_menu_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // A menu item without a recipe sells without touching stock;
            // dropping a recipe detaches its items instead of deleting them.
            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MenuItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MenuItems::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(ColumnDef::new(MenuItems::BasePrice).decimal().not_null())
                        .col(
                            ColumnDef::new(MenuItems::VatAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(MenuItems::TotalPrice).decimal().not_null())
                        .col(ColumnDef::new(MenuItems::RecipeId).uuid().null())
                        .col(
                            ColumnDef::new(MenuItems::Portion)
                                .string()
                                .not_null()
                                .default("full"),
                        )
                        .col(
                            ColumnDef::new(MenuItems::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(MenuItems::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(MenuItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MenuItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_menu_items_restaurant_id")
                                .from(MenuItems::Table, MenuItems::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_menu_items_recipe_id")
                                .from(MenuItems::Table, MenuItems::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_menu_items_restaurant_id")
                        .table(MenuItems::Table)
                        .col(MenuItems::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MenuItems {
        Table,
        Id,
        RestaurantId,
        Name,
        BasePrice,
        VatAmount,
        TotalPrice,
        RecipeId,
        Portion,
        SortOrder,
        IsAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_order_tables {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create orders table
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(Orders::BranchId).uuid().null())
                        .col(ColumnDef::new(Orders::OrderNumber).big_integer().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Tax).decimal().not_null().default(0))
                        .col(
                            ColumnDef::new(Orders::Total)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::CustomerName).string().null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().null())
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_restaurant_id")
                                .from(Orders::Table, Orders::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Order numbers restart per tenant; the pair must stay unique.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_restaurant_id_order_number")
                        .table(Orders::Table)
                        .col(Orders::RestaurantId)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            // Create order_items table
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::MenuItemId).uuid().null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::TotalPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(OrderItems::Addons)
                                .json()
                                .not_null()
                                .default("[]"),
                        )
                        .col(
                            ColumnDef::new(OrderItems::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        RestaurantId,
        BranchId,
        OrderNumber,
        Status,
        Subtotal,
        Tax,
        Total,
        CustomerName,
        CustomerPhone,
        CreatedBy,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        MenuItemId,
        Name,
        Quantity,
        UnitPrice,
        TotalPrice,
        Addons,
        Position,
        CreatedAt,
    }
}

mod m20240101_000008_create_billing_tables {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use super::m20240101_000007_create_order_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_billing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create transactions table
            manager
                .create_table(
                    Table::create()
                        .table(Transactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transactions::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(Transactions::OrderId).uuid().null())
                        .col(ColumnDef::new(Transactions::Total).decimal().not_null())
                        .col(
                            ColumnDef::new(Transactions::Tax)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Transactions::PaymentMethod)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transactions::RecordedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Transactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transactions_restaurant_id")
                                .from(Transactions::Table, Transactions::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transactions_order_id")
                                .from(Transactions::Table, Transactions::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transactions_restaurant_id")
                        .table(Transactions::Table)
                        .col(Transactions::RestaurantId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transactions_created_at")
                        .table(Transactions::Table)
                        .col(Transactions::CreatedAt)
                        .to_owned(),
                )
                .await?;

            // Create invoices table; one invoice per order, enforced here.
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Invoices::RestaurantId).uuid().not_null())
                        .col(
                            ColumnDef::new(Invoices::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Invoices::InvoiceNumber).string().not_null())
                        .col(ColumnDef::new(Invoices::SellerName).string().not_null())
                        .col(ColumnDef::new(Invoices::VatNumber).string().not_null())
                        .col(ColumnDef::new(Invoices::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(Invoices::VatAmount).decimal().not_null())
                        .col(ColumnDef::new(Invoices::Total).decimal().not_null())
                        .col(ColumnDef::new(Invoices::QrPayload).string().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceHash).string().not_null())
                        .col(ColumnDef::new(Invoices::PdfPath).string().null())
                        .col(
                            ColumnDef::new(Invoices::IssuedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_restaurant_id")
                                .from(Invoices::Table, Invoices::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoices_order_id")
                                .from(Invoices::Table, Invoices::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_restaurant_id")
                        .table(Invoices::Table)
                        .col(Invoices::RestaurantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Transactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Transactions {
        Table,
        Id,
        RestaurantId,
        OrderId,
        Total,
        Tax,
        PaymentMethod,
        RecordedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Invoices {
        Table,
        Id,
        RestaurantId,
        OrderId,
        InvoiceNumber,
        SellerName,
        VatNumber,
        Subtotal,
        VatAmount,
        Total,
        QrPayload,
        InvoiceHash,
        PdfPath,
        IssuedAt,
        CreatedAt,
    }
}

mod m20240101_000009_create_support_tables {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000009_create_support_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create support_tickets table
            manager
                .create_table(
                    Table::create()
                        .table(SupportTickets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupportTickets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupportTickets::RestaurantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupportTickets::Subject).string().not_null())
                        .col(ColumnDef::new(SupportTickets::Body).string().not_null())
                        .col(
                            ColumnDef::new(SupportTickets::Status)
                                .string()
                                .not_null()
                                .default("open"),
                        )
                        .col(
                            ColumnDef::new(SupportTickets::Priority)
                                .string()
                                .not_null()
                                .default("normal"),
                        )
                        .col(ColumnDef::new(SupportTickets::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(SupportTickets::AssignedTo).uuid().null())
                        .col(
                            ColumnDef::new(SupportTickets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupportTickets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_support_tickets_restaurant_id")
                                .from(SupportTickets::Table, SupportTickets::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_support_tickets_restaurant_id")
                        .table(SupportTickets::Table)
                        .col(SupportTickets::RestaurantId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_support_tickets_status")
                        .table(SupportTickets::Table)
                        .col(SupportTickets::Status)
                        .to_owned(),
                )
                .await?;

            // Create ticket_messages table
            manager
                .create_table(
                    Table::create()
                        .table(TicketMessages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TicketMessages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TicketMessages::TicketId).uuid().not_null())
                        .col(ColumnDef::new(TicketMessages::SenderId).uuid().not_null())
                        .col(ColumnDef::new(TicketMessages::Body).string().not_null())
                        .col(
                            ColumnDef::new(TicketMessages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ticket_messages_ticket_id")
                                .from(TicketMessages::Table, TicketMessages::TicketId)
                                .to(SupportTickets::Table, SupportTickets::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ticket_messages_ticket_id")
                        .table(TicketMessages::Table)
                        .col(TicketMessages::TicketId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TicketMessages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SupportTickets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SupportTickets {
        Table,
        Id,
        RestaurantId,
        Subject,
        Body,
        Status,
        Priority,
        CreatedBy,
        AssignedTo,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TicketMessages {
        Table,
        Id,
        TicketId,
        SenderId,
        Body,
        CreatedAt,
    }
}

mod m20240101_000010_create_chat_tables {
    use super::m20240101_000001_create_restaurants_table::Restaurants;
    use super::m20240101_000002_create_users_table::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000010_create_chat_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create chat_channels table
            manager
                .create_table(
                    Table::create()
                        .table(ChatChannels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ChatChannels::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ChatChannels::RestaurantId).uuid().not_null())
                        .col(ColumnDef::new(ChatChannels::Name).string().not_null())
                        .col(
                            ColumnDef::new(ChatChannels::IsDefault)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(ChatChannels::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(ChatChannels::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_chat_channels_restaurant_id")
                                .from(ChatChannels::Table, ChatChannels::RestaurantId)
                                .to(Restaurants::Table, Restaurants::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_chat_channels_restaurant_id")
                        .table(ChatChannels::Table)
                        .col(ChatChannels::RestaurantId)
                        .to_owned(),
                )
                .await?;

            // Create chat_members table; membership is one row per user per
            // channel, so the pair is the key.
            manager
                .create_table(
                    Table::create()
                        .table(ChatMembers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ChatMembers::ChannelId).uuid().not_null())
                        .col(ColumnDef::new(ChatMembers::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(ChatMembers::JoinedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(ChatMembers::ChannelId)
                                .col(ChatMembers::UserId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_chat_members_channel_id")
                                .from(ChatMembers::Table, ChatMembers::ChannelId)
                                .to(ChatChannels::Table, ChatChannels::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_chat_members_user_id")
                                .from(ChatMembers::Table, ChatMembers::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Create chat_messages table
            manager
                .create_table(
                    Table::create()
                        .table(ChatMessages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ChatMessages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ChatMessages::ChannelId).uuid().not_null())
                        .col(ColumnDef::new(ChatMessages::SenderId).uuid().not_null())
                        .col(ColumnDef::new(ChatMessages::Body).string().not_null())
                        .col(
                            ColumnDef::new(ChatMessages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_chat_messages_channel_id")
                                .from(ChatMessages::Table, ChatMessages::ChannelId)
                                .to(ChatChannels::Table, ChatChannels::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_chat_messages_channel_id")
                        .table(ChatMessages::Table)
                        .col(ChatMessages::ChannelId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ChatMessages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ChatMembers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ChatChannels::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ChatChannels {
        Table,
        Id,
        RestaurantId,
        Name,
        IsDefault,
        CreatedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ChatMembers {
        Table,
        ChannelId,
        UserId,
        JoinedAt,
    }

    #[derive(DeriveIden)]
    enum ChatMessages {
        Table,
        Id,
        ChannelId,
        SenderId,
        Body,
        CreatedAt,
    }
}
