/*!

This is the long-form manual for `geo_projection` and `polisgeo`.

## Regions

A region is a named area with a size rank and the statements that point to it.
A participant who agrees with one of these statements is considered to live in
(or to prefer) this region. The default table is the San Juan islands:

| statement | region          | size rank |
|-----------|-----------------|-----------|
| 64        | Orcas Island    | 3         |
| 65        | Lopez Island    | 2         |
| 66        | San Juan Island | 4         |
| 67        | Shaw Island     | 1         |

When a participant agrees with the statements of several regions, the region with
the lowest size rank is chosen: the smaller, less obvious choice is assumed to be
the more informative one. Equal ranks are resolved by name.

Participants who meet the minimum number of votes but did not agree with any region
statement are assigned to the `Other` region. It is drawn as a disk next to the real
regions. The other participants without a region are left out.

## Placement

The location of a participant is synthetic. It is drawn uniformly:
- inside the polygon (or any of the polygons) of the region, by drawing points in the
  bounding box until one falls inside the shape. After 10 000 failed draws, the
  centroid of the shape is used.
- inside the `Other` disk otherwise.

The random draws are seeded. Unless a seed is given, it is derived from the
conversation or report id, so two runs on the same data produce the same file.

## Output

The output is a GeoJSON feature collection with one point per participant:

```json
{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {
        "participant_id": 12,
        "island": "Shaw Island"
      },
      "geometry": {
        "type": "Point",
        "coordinates": [-122.93, 48.58]
      }
    }
  ]
}
```

*/
