use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS pgcrypto")
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(DataSourceEnum::Enum)
                    .values([DataSourceEnum::Pod, DataSourceEnum::Storage])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OcpUsageLineItemDailySummary::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OcpUsageLineItemDailySummary::Id)
                            .uuid()
                            .not_null()
                            .default(Expr::cust("gen_random_uuid()"))
                            .primary_key(),
                    )
                    .col(uuid(OcpUsageLineItemDailySummary::SourceUuid).not_null())
                    .col(string_len(OcpUsageLineItemDailySummary::ClusterId, 255).not_null())
                    .col(string_len_null(OcpUsageLineItemDailySummary::ClusterAlias, 255))
                    .col(integer(OcpUsageLineItemDailySummary::Year).not_null())
                    .col(string_len(OcpUsageLineItemDailySummary::Month, 2).not_null())
                    .col(date(OcpUsageLineItemDailySummary::UsageStart).not_null())
                    .col(date(OcpUsageLineItemDailySummary::UsageEnd).not_null())
                    .col(
                        ColumnDef::new(OcpUsageLineItemDailySummary::DataSource)
                            .enumeration(
                                DataSourceEnum::Enum,
                                [DataSourceEnum::Pod, DataSourceEnum::Storage],
                            )
                            .not_null(),
                    )
                    .col(string_len_null(OcpUsageLineItemDailySummary::Namespace, 255))
                    .col(string_len_null(OcpUsageLineItemDailySummary::Node, 255))
                    .col(string_len_null(OcpUsageLineItemDailySummary::ResourceId, 255))
                    // Pod-only metrics, core-hours / GB-hours
                    .col(double_null(OcpUsageLineItemDailySummary::PodUsageCpuCoreHours))
                    .col(double_null(OcpUsageLineItemDailySummary::PodRequestCpuCoreHours))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PodEffectiveUsageCpuCoreHours,
                    ))
                    .col(double_null(OcpUsageLineItemDailySummary::PodLimitCpuCoreHours))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PodUsageMemoryGigabyteHours,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PodRequestMemoryGigabyteHours,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PodEffectiveUsageMemoryGigabyteHours,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PodLimitMemoryGigabyteHours,
                    ))
                    .col(double_null(OcpUsageLineItemDailySummary::NodeCapacityCpuCores))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::NodeCapacityCpuCoreHours,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::NodeCapacityMemoryGigabytes,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::NodeCapacityMemoryGigabyteHours,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::ClusterCapacityCpuCoreHours,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::ClusterCapacityMemoryGigabyteHours,
                    ))
                    .col(json_binary_null(OcpUsageLineItemDailySummary::PodLabels))
                    // Storage-only columns
                    .col(string_len_null(
                        OcpUsageLineItemDailySummary::Persistentvolumeclaim,
                        255,
                    ))
                    .col(string_len_null(OcpUsageLineItemDailySummary::Persistentvolume, 255))
                    .col(string_len_null(OcpUsageLineItemDailySummary::Storageclass, 255))
                    .col(string_len_null(
                        OcpUsageLineItemDailySummary::CsiVolumeHandle,
                        255,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PersistentvolumeclaimCapacityGigabyteMonths,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::VolumeRequestStorageGigabyteMonths,
                    ))
                    .col(double_null(
                        OcpUsageLineItemDailySummary::PersistentvolumeclaimUsageGigabyteMonths,
                    ))
                    .col(json_binary_null(OcpUsageLineItemDailySummary::VolumeLabels))
                    .col(integer_null(OcpUsageLineItemDailySummary::CostCategoryId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ocp_usage_summary_source_usage_start")
                    .table(OcpUsageLineItemDailySummary::Table)
                    .col(OcpUsageLineItemDailySummary::SourceUuid)
                    .col(OcpUsageLineItemDailySummary::UsageStart)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ocp_usage_summary_identity_scope")
                    .table(OcpUsageLineItemDailySummary::Table)
                    .col(OcpUsageLineItemDailySummary::SourceUuid)
                    .col(OcpUsageLineItemDailySummary::Year)
                    .col(OcpUsageLineItemDailySummary::Month)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ocp_usage_summary_unique_row")
                    .table(OcpUsageLineItemDailySummary::Table)
                    .col(OcpUsageLineItemDailySummary::SourceUuid)
                    .col(OcpUsageLineItemDailySummary::UsageStart)
                    .col(OcpUsageLineItemDailySummary::DataSource)
                    .col(OcpUsageLineItemDailySummary::Namespace)
                    .col(OcpUsageLineItemDailySummary::Node)
                    .col(OcpUsageLineItemDailySummary::Persistentvolumeclaim)
                    .col(OcpUsageLineItemDailySummary::ResourceId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(OcpUsageLineItemDailySummary::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_type(Type::drop().name(DataSourceEnum::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DataSourceEnum {
    #[sea_orm(iden = "ocp_data_source")]
    Enum,
    #[sea_orm(iden = "Pod")]
    Pod,
    #[sea_orm(iden = "Storage")]
    Storage,
}

#[derive(DeriveIden)]
enum OcpUsageLineItemDailySummary {
    #[sea_orm(iden = "reporting_ocpusagelineitem_daily_summary")]
    Table,
    Id,
    SourceUuid,
    ClusterId,
    ClusterAlias,
    Year,
    Month,
    UsageStart,
    UsageEnd,
    DataSource,
    Namespace,
    Node,
    ResourceId,
    PodUsageCpuCoreHours,
    PodRequestCpuCoreHours,
    PodEffectiveUsageCpuCoreHours,
    PodLimitCpuCoreHours,
    PodUsageMemoryGigabyteHours,
    PodRequestMemoryGigabyteHours,
    PodEffectiveUsageMemoryGigabyteHours,
    PodLimitMemoryGigabyteHours,
    NodeCapacityCpuCores,
    NodeCapacityCpuCoreHours,
    NodeCapacityMemoryGigabytes,
    NodeCapacityMemoryGigabyteHours,
    ClusterCapacityCpuCoreHours,
    ClusterCapacityMemoryGigabyteHours,
    PodLabels,
    Persistentvolumeclaim,
    Persistentvolume,
    Storageclass,
    CsiVolumeHandle,
    PersistentvolumeclaimCapacityGigabyteMonths,
    VolumeRequestStorageGigabyteMonths,
    PersistentvolumeclaimUsageGigabyteMonths,
    VolumeLabels,
    CostCategoryId,
}
