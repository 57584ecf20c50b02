//
// Copyright (c) 2020-2022 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

table! {
    submissions (id) {
        id -> Int4,
        uuid -> Uuid,
        name -> Varchar,
        images -> Array<Text>,
        location -> Nullable<Varchar>,
        status -> Varchar,
        status_message -> Nullable<Text>,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        submitted_at -> Timestamptz,
        last_modified -> Nullable<Timestamptz>,
    }
}
