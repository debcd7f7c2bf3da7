diesel::table! {
    embargoed_resources (rid) {
        rid -> Text,
        pid -> Text,
        category -> Text,
        allows_authenticated -> Bool,
        date_ephemeral -> Nullable<Timestamp>,
        age_days -> Nullable<Integer>,
    }
}

diesel::table! {
    packages (pid) {
        pid -> Text,
        date_created -> Timestamp,
        date_deactivated -> Nullable<Timestamp>,
        doi -> Nullable<Text>,
    }
}
